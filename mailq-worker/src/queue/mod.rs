//! Queue module for RabbitMQ operations.
//!
//! This module provides:
//! - The broker client (connection, per-operation channels, subscriptions)
//! - Deliveries with exactly-once settlement
//! - The email job wire format
//! - The job producer used by the registration flow
//!
//! ## Architecture
//!
//! ```text
//! Registration → JobProducer → email queue → Worker → Mailer
//! ```

pub mod client;
pub mod delivery;
pub mod error;
pub mod producer;
pub mod types;

#[cfg(test)]
pub(crate) mod memory;

pub use client::{BrokerClient, Subscription, SubscriptionOptions, DEFAULT_CONSUMER_TAG};
pub use delivery::{Delivery, Disposition, Settle};
pub use error::BrokerError;
pub use producer::{EnqueueError, JobProducer, Publish};
pub use types::{payload_preview, EmailJob, JobError, VERIFICATION_SUBJECT};
