//! Configuration module for environment variable parsing.
//!
//! The broker URL and queue name are required; everything else has a
//! default. Lookups go through a closure so tests never touch the process
//! environment.

use std::env;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

use crate::queue::{SubscriptionOptions, DEFAULT_CONSUMER_TAG};

/// A required setting is absent or unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Pipeline configuration shared by the producer side and the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// AMQP connection URL
    pub mq_url: String,

    /// Name of the durable email queue
    pub email_queue: String,

    /// Unacknowledged deliveries the worker may hold
    pub prefetch: u16,

    /// Consumer tag announced by the worker
    pub consumer_tag: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefetch = match parse_or(&lookup, "MQ_PREFETCH", 1u16) {
            0 => {
                warn!(env_var = "MQ_PREFETCH", "Prefetch of 0 is unbounded, using 1");
                1
            }
            n => n,
        };

        let mq_url = required(&lookup, "MQ_URL")?;
        if !(mq_url.starts_with("amqp://") || mq_url.starts_with("amqps://")) {
            return Err(ConfigError::Invalid {
                name: "MQ_URL",
                value: mq_url,
            });
        }

        Ok(Config {
            mq_url,
            email_queue: required(&lookup, "EMAIL_QUEUE")?,
            prefetch,
            consumer_tag: lookup("MQ_CONSUMER_TAG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CONSUMER_TAG.to_string()),
        })
    }

    /// Subscription settings for the worker.
    pub fn subscription(&self) -> SubscriptionOptions {
        SubscriptionOptions {
            consumer_tag: self.consumer_tag.clone(),
            prefetch: self.prefetch,
        }
    }
}

/// Read a variable that must be present and non-blank.
pub(crate) fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Parse an optional variable, falling back to `default` when absent or invalid.
pub(crate) fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
