use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::consumer::{Consumer, ConsumerStats, DEFAULT_REPLY_TIMEOUT};
use crate::dispatch::{RouterError, ServiceContext};
use crate::handlers::default_router;
use crate::ids::ProductIdGenerator;
use crate::storage::Db;
use crate::transport::{InMemoryBroker, RpcClient};

/// Failures while starting or stopping the service.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid handler registration: {0}")]
    Router(#[from] RouterError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("consumer task failed: {0}")]
    Consumer(#[from] JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    pub request_queue: String,
    pub queue_capacity: usize,
    pub reply_timeout: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            request_queue: "products_queue".to_string(),
            queue_capacity: 32,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

/// The running service: a broker, the request queue and one consumer task.
///
/// `ProductService` is responsible for:
/// - **Dependency Wiring**: building the stores, the shared ID generator and
///   the router, and handing them to the consumer
/// - **Lifecycle Management**: starting the consumer and stopping it cleanly
///
/// # Example
///
/// ```ignore
/// let db = Db::connect("sqlite://products.db?mode=rwc", 5).await?;
/// let service = ProductService::start(ServiceOptions::default(), db)?;
///
/// let client = service.client();
/// let reply = client.call(&RequestEnvelope::new("FIND_ALL", Value::Null)).await?;
///
/// let stats = service.shutdown().await?;
/// ```
pub struct ProductService {
    broker: InMemoryBroker,
    options: ServiceOptions,
    handle: JoinHandle<ConsumerStats>,
}

impl ProductService {
    /// Starts the service on `db` with SQL-backed stores.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`LifecycleError::Router`] if a required pattern has no handler.
    pub fn start(options: ServiceOptions, db: Db) -> Result<Self, LifecycleError> {
        let ids = Arc::new(ProductIdGenerator::new());
        Self::start_with_context(options, ServiceContext::from_db(db, ids))
    }

    /// Starts the service on an already-built context.
    ///
    /// # Errors
    /// [`LifecycleError::Router`] if a required pattern has no handler.
    pub fn start_with_context(
        options: ServiceOptions,
        context: ServiceContext,
    ) -> Result<Self, LifecycleError> {
        let router = Arc::new(default_router()?);

        let broker = InMemoryBroker::new(options.queue_capacity);
        let deliveries = broker.declare_queue(&options.request_queue);

        let consumer = Consumer::new(
            router,
            context,
            Arc::new(broker.clone()),
            options.reply_timeout,
        );
        let handle = tokio::spawn(consumer.run(deliveries));

        info!(queue = %options.request_queue, "Service started");
        Ok(Self {
            broker,
            options,
            handle,
        })
    }

    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    pub fn request_queue(&self) -> &str {
        &self.options.request_queue
    }

    /// A request/reply client bound to the request queue.
    pub fn client(&self) -> RpcClient {
        RpcClient::new(
            self.broker.clone(),
            self.options.request_queue.clone(),
            self.options.reply_timeout,
        )
    }

    /// Stops accepting requests, lets the consumer drain what is queued, and
    /// waits for it to finish.
    ///
    /// # Errors
    /// [`LifecycleError::Consumer`] if the consumer task panicked.
    pub async fn shutdown(self) -> Result<ConsumerStats, LifecycleError> {
        info!("Shutting down service...");

        // Deleting the queue drops its sender; the consumer sees the stream
        // end after the buffered deliveries.
        self.broker.delete_queue(&self.options.request_queue);

        let stats = self.handle.await.map_err(|e| {
            error!(error = %e, "Consumer task failed");
            LifecycleError::from(e)
        })?;

        info!(
            received = stats.received,
            acked = stats.acked,
            "Service shutdown complete."
        );
        Ok(stats)
    }
}
