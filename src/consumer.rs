//! # Request consumer
//!
//! The message loop of the service: one delivery at a time, it decodes the
//! request envelope, dispatches it, publishes the reply to the delivery's
//! `reply_to` queue with the original correlation ID, and acks.
//!
//! **Concurrency Model**:
//! Deliveries are processed sequentially. A slow request delays the ones
//! queued behind it, but requests never interleave, so each one observes the
//! store exactly as the previous one left it.
//!
//! **Failure Model**:
//! Every delivery is acked exactly once, whatever happens to it. Failing to
//! encode or publish a reply is logged and counted in [`ConsumerStats`], and
//! the loop moves on to the next delivery. The loop only ends when the
//! delivery stream closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn, Span};

use crate::dispatch::{Router, ServiceContext};
use crate::error::ServiceError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::transport::{Delivery, Publisher, Publishing, TransportError};

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

const MALFORMED_ENVELOPE_MESSAGE: &str = "Error decoding JSON";

/// Counters reported when the consumer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: u64,
    pub replied: u64,
    /// Replies that could not be encoded or published in time.
    pub failed_replies: u64,
    /// Deliveries without a `reply_to`; processed but not answered.
    pub unroutable: u64,
    pub acked: u64,
}

pub struct Consumer {
    router: Arc<Router>,
    context: ServiceContext,
    publisher: Arc<dyn Publisher>,
    reply_timeout: Duration,
    stats: ConsumerStats,
}

impl Consumer {
    pub fn new(
        router: Arc<Router>,
        context: ServiceContext,
        publisher: Arc<dyn Publisher>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            router,
            context,
            publisher,
            reply_timeout,
            stats: ConsumerStats::default(),
        }
    }

    /// Processes deliveries until the stream closes, then returns the counters.
    pub async fn run(mut self, mut deliveries: mpsc::Receiver<Delivery>) -> ConsumerStats {
        info!(patterns = ?self.router.patterns(), "Consumer started");

        while let Some(delivery) = deliveries.recv().await {
            self.process(delivery).await;
        }

        info!(
            received = self.stats.received,
            replied = self.stats.replied,
            failed_replies = self.stats.failed_replies,
            "Consumer stopped"
        );
        self.stats
    }

    #[instrument(
        name = "delivery",
        skip_all,
        fields(
            delivery_tag = delivery.delivery_tag,
            correlation_id = delivery.correlation_id.as_deref().unwrap_or(""),
            pattern = tracing::field::Empty,
        )
    )]
    async fn process(&mut self, delivery: Delivery) {
        self.stats.received += 1;

        let response = self.respond(&delivery.body).await;

        match delivery.reply_to.as_deref() {
            Some(reply_to) => {
                let correlation_id = delivery.correlation_id.clone();
                match self.publish_reply(reply_to, correlation_id, &response).await {
                    Ok(()) => {
                        self.stats.replied += 1;
                        debug!(reply_to, success = ?response.success, "Reply published");
                    }
                    Err(e) => {
                        self.stats.failed_replies += 1;
                        error!(reply_to, error = %e, "Reply not delivered");
                    }
                }
            }
            None => {
                self.stats.unroutable += 1;
                warn!("Delivery has no reply_to, dropping reply");
            }
        }

        delivery.ack();
        self.stats.acked += 1;
    }

    /// Builds the reply for one raw request body.
    ///
    /// A body that is not a request envelope gets an `error` reply; nothing
    /// is dispatched for it.
    pub async fn respond(&self, body: &[u8]) -> ResponseEnvelope {
        let request: RequestEnvelope = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                let error = ServiceError::from(e);
                warn!(kind = error.kind(), error = %error, "Malformed request envelope");
                return ResponseEnvelope::error(MALFORMED_ENVELOPE_MESSAGE, error);
            }
        };

        Span::current().record("pattern", request.pattern.as_str());
        debug!(request_id = ?request.id, "Request received");

        self.router
            .dispatch(&request.pattern, request.data, &self.context)
            .await
    }

    async fn publish_reply(
        &self,
        reply_to: &str,
        correlation_id: Option<String>,
        response: &ResponseEnvelope,
    ) -> Result<(), TransportError> {
        let body = serde_json::to_vec(response)?;
        let publishing = Publishing::json(correlation_id, body);

        match tokio::time::timeout(self.reply_timeout, self.publisher.publish(reply_to, publishing)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(self.reply_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::default_router;
    use crate::protocol::Status;
    use crate::storage::{MockProductStore, MockUserStore};
    use crate::transport::mock::MockPublisher;
    use crate::model::User;
    use serde_json::json;

    fn consumer(users: MockUserStore, publisher: MockPublisher, timeout: Duration) -> Consumer {
        let context = ServiceContext::new(Arc::new(MockProductStore::new()), Arc::new(users));
        Consumer::new(
            Arc::new(default_router().unwrap()),
            context,
            Arc::new(publisher),
            timeout,
        )
    }

    fn request(pattern: &str, data: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&RequestEnvelope::new(pattern, data)).unwrap()
    }

    fn reply_of(publishing: &Publishing) -> ResponseEnvelope {
        serde_json::from_slice(&publishing.body).unwrap()
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_stop_the_loop() {
        let mut users = MockUserStore::new();
        users
            .expect_find_user_by_username()
            .times(2)
            .returning(|name| Ok(Some(User::new(1, name))));

        let publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .return_err(TransportError::Publish("channel closed".into()));
        publisher.expect_publish().to("replies").return_ok();

        let (tx, rx) = mpsc::channel(4);
        for correlation in ["1", "2"] {
            let delivery = Delivery::new(
                0,
                request("GET_USERBYNAME", json!({"username": "alice"})),
                Some("replies".into()),
                Some(correlation.into()),
            );
            tx.send(delivery).await.unwrap();
        }
        drop(tx);

        let stats = consumer(users, publisher.clone(), DEFAULT_REPLY_TIMEOUT)
            .run(rx)
            .await;

        assert_eq!(stats.received, 2);
        assert_eq!(stats.failed_replies, 1);
        assert_eq!(stats.replied, 1);
        assert_eq!(stats.acked, 2);

        let published = publisher.published();
        assert_eq!(published[1].1.correlation_id.as_deref(), Some("2"));
        assert_eq!(reply_of(&published[1].1).success, Status::Success);
        publisher.verify();
    }

    #[tokio::test]
    async fn test_slow_publish_hits_the_deadline() {
        let publisher = MockPublisher::new();
        publisher.expect_publish().return_after(Duration::from_secs(5));

        let (tx, rx) = mpsc::channel(1);
        tx.send(Delivery::new(0, request("NOPE", json!(null)), Some("replies".into()), None))
            .await
            .unwrap();
        drop(tx);

        let stats = consumer(MockUserStore::new(), publisher.clone(), Duration::from_millis(20))
            .run(rx)
            .await;

        assert_eq!(stats.failed_replies, 1);
        assert_eq!(stats.acked, 1);
        publisher.verify();
    }

    #[tokio::test]
    async fn test_malformed_envelope_gets_error_reply() {
        let publisher = MockPublisher::new();
        publisher.expect_publish().to("replies").return_ok();

        let (tx, rx) = mpsc::channel(1);
        tx.send(Delivery::new(0, b"not json".to_vec(), Some("replies".into()), Some("9".into())))
            .await
            .unwrap();
        drop(tx);

        let stats = consumer(MockUserStore::new(), publisher.clone(), DEFAULT_REPLY_TIMEOUT)
            .run(rx)
            .await;
        assert_eq!(stats.replied, 1);

        let (_, publishing) = &publisher.published()[0];
        assert_eq!(publishing.content_type, "application/json");
        assert_eq!(publishing.correlation_id.as_deref(), Some("9"));
        let reply = reply_of(publishing);
        assert_eq!(reply.success, Status::Error);
        assert_eq!(reply.message, MALFORMED_ENVELOPE_MESSAGE);
    }

    #[tokio::test]
    async fn test_delivery_without_reply_to_is_still_acked() {
        let publisher = MockPublisher::new();

        let (tx, rx) = mpsc::channel(1);
        tx.send(Delivery::new(0, request("NOPE", json!(null)), None, None))
            .await
            .unwrap();
        drop(tx);

        let stats = consumer(MockUserStore::new(), publisher.clone(), DEFAULT_REPLY_TIMEOUT)
            .run(rx)
            .await;
        assert_eq!(stats.unroutable, 1);
        assert_eq!(stats.acked, 1);
        assert!(publisher.published().is_empty());
    }
}
