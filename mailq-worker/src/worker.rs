//! Email job processing.
//!
//! Deliveries are handled one at a time, in the order the stream yields
//! them:
//!
//! ```text
//! received ── decode fails ──► discard (nack, requeue=false)
//!    │
//!    └── decode ok ── send ok ───► ack
//!                  └─ send fails ─► requeue (nack, requeue=true)
//! ```
//!
//! Malformed payloads cannot become valid by retrying, so they are dropped.
//! Mailer failures are assumed transient and left to broker redelivery.

use futures::{Stream, StreamExt};
use tracing::{error, info, warn};

use crate::mail::Mailer;
use crate::queue::{payload_preview, BrokerError, Delivery, Disposition, EmailJob};

/// Counters for one run of the worker loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub acked: u64,
    pub discarded: u64,
    pub requeued: u64,
    /// Deliveries whose ack/nack could not be sent
    pub settle_failures: u64,
}

impl WorkerStats {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::Discard => self.discarded += 1,
            Disposition::Requeue => self.requeued += 1,
        }
    }
}

/// Consumes email jobs and hands them to a [`Mailer`].
pub struct Worker<M> {
    mailer: M,
    queue: String,
}

impl<M: Mailer> Worker<M> {
    pub fn new(mailer: M, queue: impl Into<String>) -> Self {
        Self {
            mailer,
            queue: queue.into(),
        }
    }

    /// Process deliveries until the stream ends.
    ///
    /// Per-delivery failures never stop the loop. Only the end of the
    /// stream (channel or connection closed) returns.
    pub async fn run<S>(&self, mut deliveries: S) -> WorkerStats
    where
        S: Stream<Item = Result<Delivery, BrokerError>> + Unpin,
    {
        let mut stats = WorkerStats::default();

        info!(queue = %self.queue, mailer = self.mailer.name(), "worker_ready");

        while let Some(item) = deliveries.next().await {
            match item {
                Ok(delivery) => {
                    stats.received += 1;
                    match self.handle(delivery).await {
                        Ok(disposition) => stats.record(disposition),
                        Err(_) => stats.settle_failures += 1,
                    }
                }
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "rabbitmq_delivery_error");
                }
            }
        }

        warn!(
            queue = %self.queue,
            received = stats.received,
            acked = stats.acked,
            discarded = stats.discarded,
            requeued = stats.requeued,
            "rabbitmq_consumer_closed"
        );

        stats
    }

    /// Process and settle a single delivery.
    ///
    /// Returns the disposition that was sent, or the error raised while
    /// sending it. In the latter case the broker redelivers the message once
    /// the channel is gone.
    pub async fn handle(&self, delivery: Delivery) -> Result<Disposition, BrokerError> {
        let delivery_tag = delivery.tag();

        info!(
            queue = %self.queue,
            delivery_tag = delivery_tag,
            redelivered = delivery.redelivered(),
            body_length = delivery.payload().len(),
            "worker_job_received"
        );

        let (disposition, to) = match EmailJob::decode(delivery.payload()) {
            Ok(job) => (self.deliver(delivery_tag, &job).await, job.to),
            Err(e) => {
                error!(
                    delivery_tag = delivery_tag,
                    error = %e,
                    body_preview = %payload_preview(delivery.payload()),
                    "worker_job_malformed"
                );
                let to = recipient_hint(delivery.payload()).unwrap_or_else(|| "unknown".to_string());
                (Disposition::Discard, to)
            }
        };

        match delivery.settle(disposition).await {
            Ok(()) => {
                info!(
                    queue = %self.queue,
                    delivery_tag = delivery_tag,
                    to = %to,
                    disposition = %disposition,
                    "worker_job_settled"
                );
                Ok(disposition)
            }
            Err(e) => {
                error!(
                    delivery_tag = delivery_tag,
                    to = %to,
                    disposition = %disposition,
                    error = %e,
                    "rabbitmq_settle_failed"
                );
                Err(e)
            }
        }
    }

    async fn deliver(&self, delivery_tag: u64, job: &EmailJob) -> Disposition {
        info!(
            delivery_tag = delivery_tag,
            to = %job.to,
            has_plain = job.plain_text().is_some(),
            has_html = job.html().is_some(),
            "worker_send_starting"
        );

        match self.mailer.send(job).await {
            Ok(()) => Disposition::Ack,
            Err(e) => {
                warn!(
                    delivery_tag = delivery_tag,
                    to = %job.to,
                    mailer = self.mailer.name(),
                    error = %e,
                    "worker_send_failed"
                );
                Disposition::Requeue
            }
        }
    }
}

/// Best-effort recipient from a payload that failed validation.
fn recipient_hint(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("to")?.as_str().map(str::to_string)
}
