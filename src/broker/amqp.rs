//! AMQP backend over `lapin`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tracing::{debug, info};

use crate::broker::connection::{Channel, Connector, DeliveryStream};
use crate::broker::envelope::Envelope;
use crate::broker::queue::QueueDeclaration;
use crate::utils::MessagingError;

const REPLY_SUCCESS: u16 = 200;

/// One process-wide AMQP connection. Channels are opened on it on demand.
pub struct AmqpConnector {
    connection: Connection,
}

impl AmqpConnector {
    pub async fn connect(uri: &str) -> Result<Self, MessagingError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| MessagingError::Connection(format!("failed to connect to broker: {e}")))?;
        info!("connected to message broker");
        Ok(Self { connection })
    }
}

#[async_trait]
impl Connector for AmqpConnector {
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, MessagingError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| MessagingError::Connection(format!("failed to open a channel: {e}")))?;
        debug!(channel_id = channel.id(), "channel opened");
        Ok(Arc::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.connection.close(REPLY_SUCCESS, "shutting down").await?;
        info!("broker connection closed");
        Ok(())
    }
}

pub struct AmqpChannel {
    channel: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_queue(&self, declaration: &QueueDeclaration) -> Result<String, MessagingError> {
        let options = QueueDeclareOptions {
            durable: declaration.durable,
            auto_delete: declaration.auto_delete,
            exclusive: declaration.exclusive,
            ..QueueDeclareOptions::default()
        };
        let queue = self
            .channel
            .queue_declare(&declaration.name, options, FieldTable::default())
            .await
            .map_err(|e| MessagingError::Declaration {
                queue: declaration.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(queue.name().as_str().to_string())
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), MessagingError> {
        let publish_error = |e: lapin::Error| MessagingError::Publish {
            queue: envelope.queue.clone(),
            reason: e.to_string(),
        };

        let mut properties =
            BasicProperties::default().with_content_type(ShortString::from(envelope.content_type.clone()));
        if let Some(correlation_id) = &envelope.correlation_id {
            properties = properties.with_correlation_id(ShortString::from(correlation_id.clone()));
        }
        if let Some(reply_to) = &envelope.reply_to {
            properties = properties.with_reply_to(ShortString::from(reply_to.clone()));
        }

        self.channel
            .basic_publish(
                "",
                &envelope.queue,
                BasicPublishOptions::default(),
                &envelope.body,
                properties,
            )
            .await
            .map_err(publish_error)?
            .await
            .map_err(publish_error)?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, MessagingError> {
        let options = BasicConsumeOptions {
            no_ack: true,
            ..BasicConsumeOptions::default()
        };
        let consumer = self
            .channel
            .basic_consume(queue, consumer_tag, options, FieldTable::default())
            .await
            .map_err(|e| MessagingError::Connection(format!("failed to register a consumer on {queue}: {e}")))?;

        let queue = queue.to_string();
        Ok(consumer
            .map(move |delivery| {
                delivery
                    .map(|d| envelope_from_delivery(&queue, d))
                    .map_err(MessagingError::from)
            })
            .boxed())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.channel.close(REPLY_SUCCESS, "channel closed").await?;
        Ok(())
    }
}

fn envelope_from_delivery(queue: &str, delivery: Delivery) -> Envelope {
    let properties = &delivery.properties;
    let content_type = properties
        .content_type()
        .as_ref()
        .map(|c| c.as_str().to_string())
        .unwrap_or_default();
    let correlation_id = properties
        .correlation_id()
        .as_ref()
        .map(|c| c.as_str().to_string());
    let reply_to = properties.reply_to().as_ref().map(|r| r.as_str().to_string());

    Envelope {
        queue: queue.to_string(),
        content_type,
        correlation_id,
        reply_to,
        body: delivery.data,
    }
}
