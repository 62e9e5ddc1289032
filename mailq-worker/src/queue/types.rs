//! Queue message types.
//!
//! This module defines the wire format of the email queue:
//!
//! ```text
//! { "to": string, "subject": string, "plain_body": string?, "html_body": string? }
//! ```
//!
//! Jobs are validated on both sides of the queue. The producer refuses to
//! enqueue an invalid job and the worker classifies an invalid payload as a
//! permanent failure.

use lettre::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Subject line used for account verification emails.
pub const VERIFICATION_SUBJECT: &str = "Verify your account";

/// Maximum number of payload bytes included in diagnostic log lines.
pub const PAYLOAD_PREVIEW_LIMIT: usize = 500;

/// Reasons a payload cannot become a deliverable [`EmailJob`].
///
/// Every variant is permanent: retrying the same bytes cannot succeed.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("malformed job payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("job has an empty recipient address")]
    EmptyRecipient,

    #[error("job recipient `{address}` is not a valid address: {source}")]
    InvalidRecipient {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("job has an empty subject")]
    EmptySubject,

    #[error("job has neither a plain nor an html body")]
    MissingBody,
}

/// An email job carried on the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient email address
    pub to: String,
    /// Email subject
    pub subject: String,
    /// Plain text body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_body: Option<String>,
    /// HTML body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

impl EmailJob {
    /// Create a job with a plain text body only.
    pub fn plain(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            plain_body: Some(body.into()),
            html_body: None,
        }
    }

    /// Attach an HTML alternative.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html_body = Some(html.into());
        self
    }

    /// Build the account verification email for a freshly issued code.
    pub fn verification(to: impl Into<String>, username: &str, code: &str) -> Self {
        Self::plain(
            to,
            VERIFICATION_SUBJECT,
            format!("Hello {username}, please verify your account using code: {code}"),
        )
        .with_html(format!(
            "<p>Hello {username},</p><p>Please verify your account using code: <b>{code}</b></p>"
        ))
    }

    /// The plain body, if present and non-empty.
    pub fn plain_text(&self) -> Option<&str> {
        self.plain_body.as_deref().filter(|s| !s.is_empty())
    }

    /// The HTML body, if present and non-empty.
    pub fn html(&self) -> Option<&str> {
        self.html_body.as_deref().filter(|s| !s.is_empty())
    }

    /// Check the invariants a deliverable job must satisfy.
    pub fn validate(&self) -> Result<(), JobError> {
        if self.to.trim().is_empty() {
            return Err(JobError::EmptyRecipient);
        }
        if let Err(source) = self.to.parse::<Address>() {
            return Err(JobError::InvalidRecipient {
                address: self.to.clone(),
                source,
            });
        }
        if self.subject.trim().is_empty() {
            return Err(JobError::EmptySubject);
        }
        if self.plain_text().is_none() && self.html().is_none() {
            return Err(JobError::MissingBody);
        }
        Ok(())
    }

    /// Serialize a validated job into its wire payload.
    pub fn encode(&self) -> Result<Vec<u8>, JobError> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize and validate a wire payload.
    pub fn decode(payload: &[u8]) -> Result<Self, JobError> {
        let job: EmailJob = serde_json::from_slice(payload)?;
        job.validate()?;
        Ok(job)
    }
}

/// Lossy UTF-8 preview of a payload, truncated for logging.
pub fn payload_preview(payload: &[u8]) -> String {
    String::from_utf8_lossy(&payload[..payload.len().min(PAYLOAD_PREVIEW_LIMIT)]).into_owned()
}
