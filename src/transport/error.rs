use std::time::Duration;

use thiserror::Error;

/// Broker-side failures. These never become response envelopes; the
/// consumer logs them and moves on.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no such queue: {0}")]
    UnknownQueue(String),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed")]
    Closed,

    #[error("publish failed: {0}")]
    Publish(String),
}
