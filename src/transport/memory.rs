//! In-process broker over tokio channels.
//!
//! Queues are bounded `mpsc` channels addressed by name. Publishing to a
//! queue that was never declared fails with [`TransportError::UnknownQueue`],
//! like publishing with `mandatory` set on a real broker. Deleting a queue
//! drops its sender, which ends the consumer reading from it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Acker, Delivery, Publisher, Publishing, TransportError};
use crate::protocol::{RequestEnvelope, ResponseEnvelope};

#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Debug)]
struct BrokerInner {
    queues: Mutex<HashMap<String, mpsc::Sender<Delivery>>>,
    capacity: usize,
    next_tag: AtomicU64,
    next_queue: AtomicU64,
    acker: Acker,
}

impl InMemoryBroker {
    /// `capacity` bounds every queue; senders wait when a queue is full.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                queues: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                next_tag: AtomicU64::new(1),
                next_queue: AtomicU64::new(1),
                acker: Acker::default(),
            }),
        }
    }

    /// Declares `name` and returns its consumer side.
    ///
    /// Redeclaring a queue replaces it; the previous consumer sees the old
    /// queue close once its buffered deliveries are drained.
    pub fn declare_queue(&self, name: &str) -> mpsc::Receiver<Delivery> {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.queues().insert(name.to_string(), sender);
        debug!(queue = name, "Queue declared");
        receiver
    }

    /// Declares a queue with a broker-chosen name, for replies.
    pub fn declare_exclusive_queue(&self) -> (String, mpsc::Receiver<Delivery>) {
        let n = self.inner.next_queue.fetch_add(1, Ordering::SeqCst);
        let name = format!("amq.gen-reply-{n}");
        let receiver = self.declare_queue(&name);
        (name, receiver)
    }

    /// Removes `name`. Returns false if it did not exist.
    pub fn delete_queue(&self, name: &str) -> bool {
        let removed = self.queues().remove(name).is_some();
        debug!(queue = name, removed, "Queue deleted");
        removed
    }

    /// Enqueues a message on `queue` and returns its delivery tag.
    ///
    /// # Errors
    /// [`TransportError::UnknownQueue`] if the queue is not declared, and
    /// [`TransportError::Closed`] if its consumer has gone away.
    pub async fn send(
        &self,
        queue: &str,
        body: Vec<u8>,
        reply_to: Option<String>,
        correlation_id: Option<String>,
    ) -> Result<u64, TransportError> {
        let sender = self
            .queues()
            .get(queue)
            .cloned()
            .ok_or_else(|| TransportError::UnknownQueue(queue.to_string()))?;

        let tag = self.inner.next_tag.fetch_add(1, Ordering::SeqCst);
        let delivery = Delivery::new(tag, body, reply_to, correlation_id)
            .with_acker(self.inner.acker.clone());
        sender
            .send(delivery)
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok(tag)
    }

    /// Deliveries acknowledged so far, across all queues.
    pub fn acked(&self) -> u64 {
        self.inner.acker.count()
    }

    fn queues(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<Delivery>>> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Publisher for InMemoryBroker {
    async fn publish(&self, routing_key: &str, publishing: Publishing) -> Result<(), TransportError> {
        self.send(routing_key, publishing.body, None, publishing.correlation_id)
            .await
            .map(|_| ())
    }
}

/// Request/reply caller over an [`InMemoryBroker`].
///
/// Owns a private reply queue. Each call gets a fresh correlation ID; replies
/// carrying any other ID (late answers to calls that timed out) are skipped.
/// Calls on one client are serialised. Dropping the client deletes its reply
/// queue.
pub struct RpcClient {
    broker: InMemoryBroker,
    request_queue: String,
    reply_queue: String,
    replies: tokio::sync::Mutex<mpsc::Receiver<Delivery>>,
    next_correlation: AtomicU64,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(broker: InMemoryBroker, request_queue: impl Into<String>, timeout: Duration) -> Self {
        let (reply_queue, replies) = broker.declare_exclusive_queue();
        Self {
            broker,
            request_queue: request_queue.into(),
            reply_queue,
            replies: tokio::sync::Mutex::new(replies),
            next_correlation: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Sends `request` and waits for its reply.
    ///
    /// # Errors
    /// Any [`TransportError`] from sending, waiting or decoding the reply.
    pub async fn call(&self, request: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        let body = serde_json::to_vec(request)?;
        let reply = self.call_raw(body).await?;
        Ok(serde_json::from_slice(&reply)?)
    }

    /// Sends an arbitrary body and returns the raw reply body.
    ///
    /// # Errors
    /// [`TransportError::Timeout`] if no matching reply arrives in time, or
    /// [`TransportError::Closed`] if the reply queue is gone.
    pub async fn call_raw(&self, body: Vec<u8>) -> Result<Vec<u8>, TransportError> {
        let mut replies = self.replies.lock().await;
        let correlation_id = self
            .next_correlation
            .fetch_add(1, Ordering::SeqCst)
            .to_string();

        self.broker
            .send(
                &self.request_queue,
                body,
                Some(self.reply_queue.clone()),
                Some(correlation_id.clone()),
            )
            .await?;

        let wait = async {
            while let Some(reply) = replies.recv().await {
                if reply.correlation_id.as_deref() == Some(correlation_id.as_str()) {
                    return Ok(reply.body);
                }
                warn!(
                    expected = %correlation_id,
                    received = ?reply.correlation_id,
                    "Skipping reply for another call"
                );
            }
            Err(TransportError::Closed)
        };

        tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.broker.delete_queue(&self.reply_queue);
    }
}
