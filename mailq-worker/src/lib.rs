//! mailq - asynchronous account verification email pipeline.
//!
//! This library provides the pieces shared by the registration flow and the
//! `mailq-worker` binary:
//! - `code`: secure 6-digit verification codes
//! - `queue`: RabbitMQ client, deliveries, job schema and producer
//! - `mail`: the mailer boundary and its SMTP implementation
//! - `worker`: the sequential consume-send-settle loop
//!
//! ## Architecture
//!
//! ```text
//! Registration → JobProducer → email queue → Worker → Mailer
//! ```

pub mod code;
pub mod config;
pub mod logging;
pub mod mail;
pub mod queue;
pub mod worker;

// Re-export commonly used types
pub use code::{generate_code, RandomSourceError, VerificationCode};
pub use config::{Config, ConfigError};
pub use mail::{MailError, Mailer, SmtpConfig, SmtpMailer};
pub use queue::{
    BrokerClient, BrokerError, Delivery, Disposition, EmailJob, EnqueueError, JobError,
    JobProducer, Subscription, SubscriptionOptions,
};
pub use worker::{Worker, WorkerStats};
