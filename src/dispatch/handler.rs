use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ServiceContext;
use crate::error::ServiceError;
use crate::protocol::ResponseEnvelope;

/// One operation reachable through a request pattern.
///
/// # Architecture Note
/// Every pattern gets its own type with its own `Request` and `Reply`, so a
/// payload is decoded straight into the shape that operation expects. The
/// router only ever sees the erased form, and the decode/respond plumbing is
/// written once in [`ErasedHandler`].
///
/// The message constants are the fixed human-readable texts put in the
/// response envelope. The raw error text goes into `data`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Routing key, e.g. `"CREATE_PRODUCT"`.
    const PATTERN: &'static str;

    const SUCCESS_MESSAGE: &'static str;

    const ERROR_MESSAGE: &'static str;

    /// Message used when `data` cannot be decoded into [`Handler::Request`].
    const DECODE_ERROR_MESSAGE: &'static str = "Error decoding JSON";

    type Request: DeserializeOwned + Send + 'static;

    type Reply: Serialize + Send + 'static;

    async fn handle(
        &self,
        request: Self::Request,
        ctx: &ServiceContext,
    ) -> Result<Self::Reply, ServiceError>;

    /// Message for a successful reply. Override when it depends on the result.
    fn success_message(_reply: &Self::Reply) -> &'static str {
        Self::SUCCESS_MESSAGE
    }
}

/// Object-safe form of [`Handler`] stored by the router.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn call(&self, payload: Value, ctx: &ServiceContext) -> ResponseEnvelope;
}

pub(crate) struct Erased<H>(pub(crate) H);

#[async_trait]
impl<H: Handler> ErasedHandler for Erased<H> {
    async fn call(&self, payload: Value, ctx: &ServiceContext) -> ResponseEnvelope {
        let request: H::Request = match serde_json::from_value(payload) {
            Ok(request) => request,
            Err(e) => {
                let error = ServiceError::from(e);
                warn!(pattern = H::PATTERN, kind = error.kind(), error = %error, "Payload rejected");
                return ResponseEnvelope::error(H::DECODE_ERROR_MESSAGE, error);
            }
        };

        match self.0.handle(request, ctx).await {
            Ok(reply) => {
                debug!(pattern = H::PATTERN, "Handled");
                ResponseEnvelope::ok(H::success_message(&reply), &reply)
            }
            Err(error) => {
                warn!(pattern = H::PATTERN, kind = error.kind(), error = %error, "Handler failed");
                ResponseEnvelope::error(H::ERROR_MESSAGE, error)
            }
        }
    }
}
