//! Runtime orchestration and lifecycle management.
//!
//! - [`ProductService`] wires the stores, router and consumer together and
//!   owns the consumer task until [`ProductService::shutdown`].
//! - [`setup_tracing`] initializes logging.

pub mod service;
pub mod tracing;

pub use service::*;
pub use self::tracing::*;
