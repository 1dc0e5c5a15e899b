//! The transport seam between the messaging components and a concrete broker.
//!
//! A [`Connector`] stands for one long-lived broker connection and hands out
//! channels. Components take the connector by reference, open the channels
//! they need and never reconnect on their own: a failed operation is reported
//! to the caller, which owns any retry policy.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::broker::envelope::Envelope;
use crate::broker::queue::QueueDeclaration;
use crate::utils::MessagingError;

/// Deliveries from a consumer. Messages are acknowledged on delivery.
pub type DeliveryStream = BoxStream<'static, Result<Envelope, MessagingError>>;

#[async_trait]
pub trait Channel: Send + Sync {
    /// Declares a queue and returns its name (broker-generated when the
    /// declaration's name is empty).
    async fn declare_queue(&self, declaration: &QueueDeclaration) -> Result<String, MessagingError>;

    /// Enqueues one message on `envelope.queue` through the default exchange.
    async fn publish(&self, envelope: Envelope) -> Result<(), MessagingError>;

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, MessagingError>;

    async fn close(&self) -> Result<(), MessagingError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, MessagingError>;

    async fn close(&self) -> Result<(), MessagingError>;
}
