//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the global `tracing` subscriber.
//!
//! The default format is compact and hides the module prefix
//! (`with_target(false)`), so a line carries the span chain and the
//! structured fields and little else. `LOG_FORMAT=json` switches to one JSON
//! object per line for log shippers.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo run
//!
//! # Per-request detail, including store lookups
//! RUST_LOG=debug cargo run
//!
//! # Only this crate at debug, sqlx at warn
//! RUST_LOG=product_service=debug,sqlx=warn cargo run
//! ```
//!
//! ## What a request looks like
//!
//! Every delivery runs inside a `delivery` span carrying the delivery tag,
//! the correlation ID and the pattern; dispatch adds a nested `dispatch`
//! span, and repository methods add their own:
//!
//! ```text
//! INFO delivery:dispatch:create_product: Product created id=1 product_id=product-1700000000-42 delivery_tag=1 correlation_id="1" pattern="CREATE_PRODUCT" name=Widget
//! WARN delivery:dispatch: Handler failed pattern="CREATE_PRODUCT" kind="duplicate" error=product with the same name already exists
//! ```

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;

/// Installs the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` is used. Logs go to
/// stderr, leaving stdout to the replies.
pub fn setup_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        LogFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init(),
    }
}
