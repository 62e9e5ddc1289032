//! Worker process wiring.
//!
//! Connects to RabbitMQ, declares the email queue, subscribes and runs the
//! worker loop until a shutdown signal arrives or the subscription ends.

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{error, info};

use mailq::{BrokerClient, Config, SmtpConfig, SmtpMailer, Worker};

/// Run the consumer.
///
/// This function:
/// 1. Connects to RabbitMQ using the configured URL
/// 2. Declares the queue (idempotent operation)
/// 3. Subscribes with manual acknowledgement
/// 4. Processes deliveries one at a time
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
pub async fn run(config: Config, smtp: SmtpConfig) -> Result<()> {
    let mailer = SmtpMailer::new(smtp).context("Failed to create SMTP mailer")?;

    let mut broker = BrokerClient::connect(&config.mq_url)
        .await
        .context("Failed to connect to RabbitMQ")?;

    broker
        .declare_queue(&config.email_queue)
        .await
        .context("Failed to declare queue")?;

    let mut subscription = broker
        .consume(&config.email_queue, &config.subscription())
        .await
        .context("Failed to start consumer")?;

    let worker = Worker::new(mailer, config.email_queue.as_str());

    let stream_ended = tokio::select! {
        _ = shutdown_signal() => {
            info!("worker_stopping");
            false
        }
        stats = worker.run(&mut subscription) => {
            error!(received = stats.received, "worker_subscription_ended");
            true
        }
    };

    subscription.close().await;
    broker.close().await;

    if stream_ended {
        bail!("RabbitMQ subscription ended unexpectedly");
    }

    info!("worker_shutdown_complete");
    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
