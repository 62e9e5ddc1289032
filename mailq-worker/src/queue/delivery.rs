//! In-flight deliveries and their terminal dispositions.
//!
//! A [`Delivery`] is settled by value: `ack`, `discard` and `requeue` all
//! consume it, so a delivery tag can receive at most one disposition.

use std::fmt;

use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use super::error::BrokerError;

/// Terminal outcome sent to the broker for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `basic.ack`, the message is removed from the queue.
    Ack,
    /// `basic.nack` with `requeue=false`, the message is dropped.
    Discard,
    /// `basic.nack` with `requeue=true`, the message is redelivered later.
    Requeue,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Ack => "ack",
            Disposition::Discard => "discard",
            Disposition::Requeue => "requeue",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends a disposition for a delivery tag back to its source.
#[async_trait]
pub trait Settle: Send + Sync {
    async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), BrokerError>;
}

#[async_trait]
impl Settle for Acker {
    async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), BrokerError> {
        let result = match disposition {
            Disposition::Ack => self.ack(BasicAckOptions { multiple: false }).await,
            Disposition::Discard => {
                self.nack(BasicNackOptions {
                    multiple: false,
                    requeue: false,
                })
                .await
            }
            Disposition::Requeue => {
                self.nack(BasicNackOptions {
                    multiple: false,
                    requeue: true,
                })
                .await
            }
        };

        result.map_err(|source| BrokerError::Settle { tag, source })
    }
}

/// One message handed to a consumer, awaiting its disposition.
pub struct Delivery {
    tag: u64,
    payload: Vec<u8>,
    redelivered: bool,
    settler: Box<dyn Settle>,
}

impl Delivery {
    pub fn new(tag: u64, payload: Vec<u8>, redelivered: bool, settler: impl Settle + 'static) -> Self {
        Self {
            tag,
            payload,
            redelivered,
            settler: Box::new(settler),
        }
    }

    /// Broker delivery tag.
    pub fn tag(&self) -> u64 {
        self.tag
    }

    /// Raw message body.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether a previous consumer received this message without acking it.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.settle(Disposition::Ack).await
    }

    pub async fn discard(self) -> Result<(), BrokerError> {
        self.settle(Disposition::Discard).await
    }

    pub async fn requeue(self) -> Result<(), BrokerError> {
        self.settle(Disposition::Requeue).await
    }

    pub async fn settle(self, disposition: Disposition) -> Result<(), BrokerError> {
        self.settler.settle(self.tag, disposition).await
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Delivery::new(
            delivery.delivery_tag,
            delivery.data,
            delivery.redelivered,
            delivery.acker,
        )
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("payload_length", &self.payload.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(u64, Disposition)>>>);

    #[async_trait]
    impl Settle for Recorder {
        async fn settle(&self, tag: u64, disposition: Disposition) -> Result<(), BrokerError> {
            self.0.lock().unwrap().push((tag, disposition));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_each_settle_method_sends_its_disposition() {
        let recorder = Recorder::default();

        Delivery::new(1, vec![], false, recorder.clone()).ack().await.unwrap();
        Delivery::new(2, vec![], false, recorder.clone()).discard().await.unwrap();
        Delivery::new(3, vec![], true, recorder.clone()).requeue().await.unwrap();

        let settled = recorder.0.lock().unwrap().clone();
        assert_eq!(
            settled,
            vec![
                (1, Disposition::Ack),
                (2, Disposition::Discard),
                (3, Disposition::Requeue),
            ]
        );
    }

    #[test]
    fn test_accessors_and_debug() {
        let delivery = Delivery::new(7, b"{}".to_vec(), true, Recorder::default());

        assert_eq!(delivery.tag(), 7);
        assert_eq!(delivery.payload(), b"{}");
        assert!(delivery.redelivered());

        let debug = format!("{delivery:?}");
        assert!(debug.contains("payload_length: 2"));
    }
}
