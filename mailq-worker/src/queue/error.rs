//! Broker error type.

use thiserror::Error;

/// Errors raised by broker operations.
///
/// Connect, declare and consume failures are fatal at startup. Publish and
/// settle failures are local channel or connection errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to broker: {0}")]
    Connect(#[source] lapin::Error),

    #[error("failed to open channel: {0}")]
    Channel(#[source] lapin::Error),

    #[error("failed to declare queue `{queue}`: {source}")]
    Declare {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to publish to queue `{queue}`: {source}")]
    Publish {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to consume from queue `{queue}`: {source}")]
    Consume {
        queue: String,
        #[source]
        source: lapin::Error,
    },

    #[error("failed to settle delivery {tag}: {source}")]
    Settle {
        tag: u64,
        #[source]
        source: lapin::Error,
    },

    #[error("broker connection is closed")]
    Closed,
}
