//! # Product Service binary
//!
//! Runs the service against the configured database and bridges it to
//! stdin/stdout: every non-empty stdin line is sent to the request queue as
//! one request envelope, and its reply is written to stdout as one line.
//! Stops on EOF or Ctrl-C, after the consumer has drained.

use product_service::config::ServiceConfig;
use product_service::lifecycle::{setup_tracing, ProductService};
use product_service::storage::Db;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = ServiceConfig::load().unwrap_or_else(|e| e.exit());

    setup_tracing(&config.logging.log_level, config.logging.log_format);

    let db = Db::connect(&config.database.database_url, config.database.max_connections)
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))?;

    if config.database.init_schema {
        db.ensure_schema()
            .await
            .map_err(|e| format!("Failed to create schema: {e}"))?;
        info!("Schema ready");
    }

    let service = ProductService::start(config.service_options(), db.clone())
        .map_err(|e| e.to_string())?;
    let client = service.client();
    info!(
        request_queue = service.request_queue(),
        reply_queue = client.reply_queue(),
        "Reading requests from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match client.call_raw(line.into_bytes()).await {
                    Ok(mut reply) => {
                        reply.push(b'\n');
                        stdout.write_all(&reply).await.map_err(|e| e.to_string())?;
                        stdout.flush().await.map_err(|e| e.to_string())?;
                    }
                    Err(e) => error!(error = %e, "Request failed"),
                },
                Ok(None) => {
                    info!("Input closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    let stats = service.shutdown().await.map_err(|e| e.to_string())?;
    db.close().await;

    info!(
        received = stats.received,
        replied = stats.replied,
        failed_replies = stats.failed_replies,
        "Application completed successfully"
    );
    Ok(())
}
