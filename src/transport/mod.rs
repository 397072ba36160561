//! # Broker boundary
//!
//! The service only needs two things from a message broker: a stream of
//! [`Delivery`] values to consume, and a [`Publisher`] to send replies with.
//! Both are plain Rust types here so the consumer can run against the
//! in-process [`InMemoryBroker`], a [`mock::MockPublisher`], or any other
//! broker adapter that produces the same shapes.

pub mod error;
pub mod memory;
pub mod mock;

pub use error::TransportError;
pub use memory::{InMemoryBroker, RpcClient};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One inbound message.
///
/// Dropping a delivery without calling [`Delivery::ack`] leaves it unacked.
#[derive(Debug)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    /// Queue the reply should be published to.
    pub reply_to: Option<String>,
    /// Opaque token echoed on the reply.
    pub correlation_id: Option<String>,
    acker: Acker,
}

impl Delivery {
    pub fn new(
        delivery_tag: u64,
        body: Vec<u8>,
        reply_to: Option<String>,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            delivery_tag,
            body,
            reply_to,
            correlation_id,
            acker: Acker::default(),
        }
    }

    pub fn with_acker(mut self, acker: Acker) -> Self {
        self.acker = acker;
        self
    }

    /// Acknowledges the delivery. Consumes it, so a delivery is acked at most once.
    pub fn ack(self) {
        self.acker.ack();
    }
}

/// Counts acknowledgements for whoever handed out the deliveries.
#[derive(Debug, Clone, Default)]
pub struct Acker {
    acked: Arc<AtomicU64>,
}

impl Acker {
    fn ack(&self) {
        self.acked.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publishing {
    pub content_type: String,
    pub correlation_id: Option<String>,
    pub body: Vec<u8>,
}

impl Publishing {
    pub fn json(correlation_id: Option<String>, body: Vec<u8>) -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            correlation_id,
            body,
        }
    }
}

/// Sends a message to a named queue through the default exchange.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, routing_key: &str, publishing: Publishing) -> Result<(), TransportError>;
}
