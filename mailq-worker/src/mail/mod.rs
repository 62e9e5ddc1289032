//! Outbound mail delivery.
//!
//! The worker talks to mail transports through the [`Mailer`] trait. Any
//! error it reports is treated as transient by the worker.

pub mod smtp;

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::EmailJob;

pub use smtp::{SmtpConfig, SmtpMailer};

/// Errors reported by a [`Mailer`].
#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address `{address}`: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("job has no body to send")]
    EmptyBody,

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Hands an email to an upstream transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, job: &EmailJob) -> Result<(), MailError>;

    /// Short name used in log lines.
    fn name(&self) -> &'static str;
}
