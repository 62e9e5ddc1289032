//! RabbitMQ client using lapin.
//!
//! The client owns a single connection. Declaring and publishing each open a
//! short-lived channel and close it when done, so a channel-level error in
//! one call never poisons another. Consuming opens a channel owned by the
//! returned [`Subscription`].

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use lapin::{
    options::{BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use tracing::{debug, info, warn};

use super::delivery::Delivery;
use super::error::BrokerError;

/// Default consumer tag announced to the broker.
pub const DEFAULT_CONSUMER_TAG: &str = "mailq-worker";

/// Settings for a queue subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOptions {
    /// Consumer tag announced to the broker
    pub consumer_tag: String,
    /// Maximum number of unacknowledged deliveries held by the consumer
    pub prefetch: u16,
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self {
            consumer_tag: DEFAULT_CONSUMER_TAG.to_string(),
            prefetch: 1,
        }
    }
}

/// A connected broker client.
pub struct BrokerClient {
    connection: Option<Connection>,
}

impl BrokerClient {
    /// Connect to the broker at `url`.
    pub async fn connect(url: &str) -> Result<Self, BrokerError> {
        info!(url_length = url.len(), "rabbitmq_connecting");

        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(BrokerError::Connect)?;

        info!("rabbitmq_connected");

        Ok(Self {
            connection: Some(connection),
        })
    }

    /// Whether the underlying connection is still usable.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|conn| conn.status().connected())
            .unwrap_or(false)
    }

    async fn open_channel(&self) -> Result<Channel, BrokerError> {
        let connection = match self.connection.as_ref() {
            Some(conn) if conn.status().connected() => conn,
            _ => return Err(BrokerError::Closed),
        };

        connection
            .create_channel()
            .await
            .map_err(BrokerError::Channel)
    }

    /// Ensure a durable, non-exclusive, non-auto-delete queue named `name`
    /// exists. Safe to repeat with the same arguments.
    pub async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        let channel = self.open_channel().await?;

        let result = channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;

        close_channel(channel).await;

        result.map_err(|source| BrokerError::Declare {
            queue: name.to_string(),
            source,
        })?;

        info!(queue = name, "rabbitmq_queue_declared");
        Ok(())
    }

    /// Publish `payload` to `queue` through the default exchange.
    ///
    /// Messages are persistent. Returns once the frames are handed to the
    /// connection; no consumer needs to be attached.
    pub async fn publish(&self, queue: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let channel = self.open_channel().await?;

        let result = match channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into()),
            )
            .await
        {
            Ok(confirm) => confirm.await.map(|_| ()),
            Err(e) => Err(e),
        };

        close_channel(channel).await;

        result.map_err(|source| BrokerError::Publish {
            queue: queue.to_string(),
            source,
        })?;

        debug!(queue = queue, body_length = payload.len(), "rabbitmq_published");
        Ok(())
    }

    /// Subscribe to `queue` with manual acknowledgement.
    pub async fn consume(
        &self,
        queue: &str,
        options: &SubscriptionOptions,
    ) -> Result<Subscription, BrokerError> {
        let channel = self.open_channel().await?;
        let consume_err = |source: lapin::Error| BrokerError::Consume {
            queue: queue.to_string(),
            source,
        };

        channel
            .basic_qos(options.prefetch, BasicQosOptions::default())
            .await
            .map_err(consume_err)?;

        info!(prefetch_count = options.prefetch, "rabbitmq_qos_set");

        let consumer = channel
            .basic_consume(
                queue,
                &options.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(consume_err)?;

        info!(queue = queue, consumer_tag = %options.consumer_tag, "rabbitmq_consumer_started");

        Ok(Subscription {
            queue: queue.to_string(),
            channel,
            consumer,
        })
    }

    /// Close the connection. Does nothing if it is already closed.
    pub async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        if !connection.status().connected() {
            debug!("rabbitmq_connection_already_closed");
            return;
        }

        if let Err(e) = connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        } else {
            info!("rabbitmq_connection_closed");
        }
    }
}

async fn close_channel(channel: Channel) {
    // A failed declare leaves the channel closed by the broker.
    if !channel.status().connected() {
        return;
    }
    if let Err(e) = channel.close(200, "OK").await {
        debug!(error = %e, "rabbitmq_channel_close_error");
    }
}

/// An open subscription yielding deliveries until its channel closes.
pub struct Subscription {
    queue: String,
    channel: Channel,
    consumer: Consumer,
}

impl Subscription {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close the subscription's channel. Unacknowledged deliveries return to
    /// the queue.
    pub async fn close(self) {
        close_channel(self.channel).await;
        info!(queue = %self.queue, "rabbitmq_subscription_closed");
    }
}

impl Stream for Subscription {
    type Item = Result<Delivery, BrokerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        Pin::new(&mut this.consumer).poll_next(cx).map(|item| {
            item.map(|result| {
                result.map(Delivery::from).map_err(|source| BrokerError::Consume {
                    queue: this.queue.clone(),
                    source,
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_defaults() {
        let options = SubscriptionOptions::default();
        assert_eq!(options.consumer_tag, DEFAULT_CONSUMER_TAG);
        assert_eq!(options.prefetch, 1);
    }

    #[tokio::test]
    async fn test_closed_client_rejects_operations() {
        let mut client = BrokerClient { connection: None };

        assert!(!client.is_connected());
        assert!(matches!(
            client.declare_queue("email_queue").await,
            Err(BrokerError::Closed)
        ));
        assert!(matches!(
            client.publish("email_queue", b"{}").await,
            Err(BrokerError::Closed)
        ));

        // Closing twice is a no-op.
        client.close().await;
        client.close().await;
    }
}
