//! mailq Worker - async RabbitMQ consumer for verification emails.
//!
//! This worker consumes email jobs from the configured queue, sends them
//! through SMTP and acknowledges, discards or requeues each delivery.

mod consumer;

use anyhow::{Context, Result};

use mailq::{logging, Config, SmtpConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv().ok();

    logging::init();

    tracing::info!("worker_starting");

    if let Some(path) = dotenv {
        tracing::info!(path = %path.display(), "dotenv_loaded");
    }

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load broker configuration")?;
    let smtp = SmtpConfig::from_env().context("Failed to load SMTP configuration")?;
    tracing::info!(
        queue = %config.email_queue,
        prefetch = config.prefetch,
        consumer_tag = %config.consumer_tag,
        smtp_host = %smtp.host,
        smtp_port = smtp.port,
        "config_loaded"
    );

    consumer::run(config, smtp).await?;

    Ok(())
}
