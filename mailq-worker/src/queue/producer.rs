//! Email job producer.
//!
//! Called from the registration flow: validates a job, serializes it and
//! publishes it to the configured queue. A failure is returned to the caller,
//! which decides whether to roll back its own state.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use super::client::BrokerClient;
use super::error::BrokerError;
use super::types::{EmailJob, JobError};

/// The broker operations a producer needs.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError>;

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

#[async_trait]
impl Publish for BrokerClient {
    async fn declare_queue(&self, queue: &str) -> Result<(), BrokerError> {
        BrokerClient::declare_queue(self, queue).await
    }

    async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        BrokerClient::publish(self, queue, payload).await
    }
}

/// Why a job could not be enqueued.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("refusing to enqueue invalid job: {0}")]
    Invalid(#[from] JobError),

    #[error("failed to enqueue job: {0}")]
    Publish(#[from] BrokerError),
}

/// Publishes [`EmailJob`]s to one queue through a borrowed broker client.
pub struct JobProducer<'a, P: ?Sized = BrokerClient> {
    broker: &'a P,
    queue: String,
}

impl<'a, P: Publish + ?Sized> JobProducer<'a, P> {
    pub fn new(broker: &'a P, queue: impl Into<String>) -> Self {
        Self {
            broker,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Declare the target queue so jobs are buffered before any worker starts.
    pub async fn prepare(&self) -> Result<(), BrokerError> {
        self.broker.declare_queue(&self.queue).await
    }

    /// Serialize `job` and publish it.
    pub async fn enqueue(&self, job: &EmailJob) -> Result<(), EnqueueError> {
        let body = job.encode()?;

        if let Err(e) = self.broker.publish(&self.queue, &body).await {
            error!(queue = %self.queue, to = %job.to, error = %e, "email_job_enqueue_failed");
            return Err(e.into());
        }

        info!(
            queue = %self.queue,
            to = %job.to,
            body_length = body.len(),
            "email_job_enqueued"
        );

        Ok(())
    }
}
