//! SMTP mailer using lettre.

use std::env;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use super::{MailError, Mailer};
use crate::config::{parse_or, required, ConfigError};
use crate::queue::EmailJob;

/// SMTP relay settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Login name, also used as the From address
    pub sender: String,
    pub password: String,
}

impl SmtpConfig {
    /// Load from `SENDER_EMAIL`, `APP_PASSWORD`, `SMTP_HOST` and `SMTP_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(SmtpConfig {
            host: lookup("SMTP_HOST")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "smtp.gmail.com".to_string()),
            port: parse_or(&lookup, "SMTP_PORT", 587),
            sender: required(&lookup, "SENDER_EMAIL")?,
            password: required(&lookup, "APP_PASSWORD")?,
        })
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

/// Sends jobs through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. No connection is made until the first send.
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config.sender.parse().map_err(|source| MailError::Address {
            address: config.sender.clone(),
            source,
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .credentials(Credentials::new(config.sender, config.password))
            .port(config.port)
            .build();

        Ok(Self { transport, from })
    }
}

fn build_message(from: &Mailbox, job: &EmailJob) -> Result<Message, MailError> {
    let to: Mailbox = job.to.parse().map_err(|source| MailError::Address {
        address: job.to.clone(),
        source,
    })?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(job.subject.as_str());

    // Plain is the primary part when both are present.
    let message = match (job.plain_text(), job.html()) {
        (Some(text), Some(html)) => builder.multipart(MultiPart::alternative_plain_html(
            text.to_string(),
            html.to_string(),
        ))?,
        (Some(text), None) => builder
            .header(ContentType::TEXT_PLAIN)
            .body(text.to_string())?,
        (None, Some(html)) => builder
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?,
        (None, None) => return Err(MailError::EmptyBody),
    };

    Ok(message)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        let message = build_message(&self.from, job)?;
        let response = self.transport.send(message).await?;

        debug!(
            to = %job.to,
            code = %response.code(),
            "smtp_message_accepted"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
