use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

use super::handler::{Erased, ErasedHandler, Handler};
use super::ServiceContext;
use crate::error::ServiceError;
use crate::protocol::ResponseEnvelope;

pub const UNKNOWN_PATTERN_MESSAGE: &str = "Unknown pattern";

/// Router construction failures. Both are startup errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("pattern registered twice: {0}")]
    DuplicatePattern(&'static str),
    #[error("no handler registered for required pattern: {0}")]
    MissingPattern(String),
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<&'static str, Box<dyn ErasedHandler>>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under [`Handler::PATTERN`].
    ///
    /// # Errors
    /// [`RouterError::DuplicatePattern`] if the pattern is already taken.
    pub fn route<H: Handler>(mut self, handler: H) -> Result<Self, RouterError> {
        if self.routes.contains_key(H::PATTERN) {
            return Err(RouterError::DuplicatePattern(H::PATTERN));
        }
        self.routes.insert(H::PATTERN, Box::new(Erased(handler)));
        Ok(self)
    }

    pub fn build(self) -> Router {
        Router {
            routes: self.routes,
        }
    }

    /// Builds the router, failing if any of `required` has no handler.
    ///
    /// # Errors
    /// [`RouterError::MissingPattern`] naming the first missing pattern.
    pub fn build_validated(self, required: &[&str]) -> Result<Router, RouterError> {
        if let Some(missing) = required.iter().find(|p| !self.routes.contains_key(**p)) {
            return Err(RouterError::MissingPattern((*missing).to_string()));
        }
        Ok(self.build())
    }
}

/// Maps request patterns to handlers.
///
/// Dispatch always produces a response envelope. Unknown patterns, payloads
/// that do not decode and handler failures all become `error` envelopes;
/// nothing here panics or aborts the caller.
pub struct Router {
    routes: HashMap<&'static str, Box<dyn ErasedHandler>>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.routes.contains_key(pattern)
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<&'static str> {
        let mut patterns: Vec<&'static str> = self.routes.keys().copied().collect();
        patterns.sort_unstable();
        patterns
    }

    /// Runs the handler for `pattern` on `payload`.
    pub async fn dispatch(
        &self,
        pattern: &str,
        payload: Value,
        ctx: &ServiceContext,
    ) -> ResponseEnvelope {
        let Some(handler) = self.routes.get(pattern) else {
            let error = ServiceError::UnknownPattern(pattern.to_string());
            warn!(pattern, kind = error.kind(), "No handler");
            return ResponseEnvelope::error(UNKNOWN_PATTERN_MESSAGE, error);
        };

        handler
            .call(payload, ctx)
            .instrument(info_span!("dispatch", pattern))
            .await
    }
}
