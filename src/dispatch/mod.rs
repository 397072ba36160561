//! # Dispatch
//!
//! Routes a request pattern to the typed [`Handler`] registered for it.
//!
//! ```rust,ignore
//! let router = Router::builder()
//!     .route(CreateProduct)?
//!     .route(GetProduct)?
//!     .build_validated(&["CREATE_PRODUCT", "GET_PRODUCT"])?;
//!
//! let reply = router.dispatch("GET_PRODUCT", json!("product-1700000000-42"), &ctx).await;
//! ```
//!
//! Registration is explicit and checked once at startup: a pattern cannot be
//! registered twice, and [`RouterBuilder::build_validated`] refuses to build
//! a router that is missing a pattern the service promises to serve.

mod context;
mod handler;
mod router;

pub use context::ServiceContext;
pub use handler::Handler;
pub use router::{Router, RouterBuilder, RouterError, UNKNOWN_PATTERN_MESSAGE};
