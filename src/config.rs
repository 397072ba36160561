//! Service configuration, from CLI flags or the environment.

use std::time::Duration;

use clap::{Args, Parser};

use crate::lifecycle::ServiceOptions;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Database settings.
#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://products.db?mode=rwc")]
    pub database_url: String,

    /// Maximum pooled connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Create the tables if they do not exist
    #[arg(long, env = "INIT_SCHEMA", default_value_t = false)]
    pub init_schema: bool,
}

/// Request queue settings.
#[derive(Debug, Clone, Args)]
pub struct QueueConfig {
    /// Queue the service consumes requests from
    #[arg(long, env = "REQUEST_QUEUE", default_value = "products_queue")]
    pub request_queue: String,

    /// Buffered deliveries per queue
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 32)]
    pub queue_capacity: usize,

    /// Deadline for publishing one reply, in seconds
    #[arg(long, env = "REPLY_TIMEOUT_SECS", default_value_t = 5)]
    pub reply_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Product service configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "product-service", about = "Message-driven product and user service", long_about = None)]
pub struct ServiceConfig {
    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub queue: QueueConfig,

    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    #[must_use]
    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            request_queue: self.queue.request_queue.clone(),
            queue_capacity: self.queue.queue_capacity,
            reply_timeout: Duration::from_secs(self.queue.reply_timeout_secs),
        }
    }
}
