use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::broker::connection::Channel;
use crate::broker::envelope::{Envelope, JSON_CONTENT_TYPE};
use crate::broker::queue::{QueueDeclaration, QueueRegistry};
use crate::utils::MessagingError;

/// Publishes onto one channel.
///
/// Every publish and declaration goes through the registry lock, so a
/// publisher can be shared between tasks without the underlying channel ever
/// seeing concurrent use. Components that need independent throughput open
/// their own channel and publisher.
pub struct Publisher {
    channel: Arc<dyn Channel>,
    registry: Mutex<QueueRegistry>,
}

impl Publisher {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            registry: Mutex::new(QueueRegistry::new()),
        }
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub async fn declare(&self, declaration: QueueDeclaration) -> Result<String, MessagingError> {
        let mut registry = self.registry.lock().await;
        registry.declare(self.channel.as_ref(), declaration).await
    }

    pub async fn is_declared(&self, queue: &str) -> bool {
        self.registry.lock().await.is_declared(queue)
    }

    /// Sends one message to `queue`, declaring it first if this channel has
    /// not done so yet. Does not wait for any consumer.
    pub async fn publish(
        &self,
        queue: &str,
        body: Vec<u8>,
        content_type: &str,
        correlation_id: Option<&str>,
        reply_to: Option<&str>,
    ) -> Result<(), MessagingError> {
        let envelope = Envelope {
            queue: queue.to_string(),
            content_type: content_type.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            reply_to: reply_to.map(str::to_string),
            body,
        };
        self.send(envelope, true).await
    }

    pub async fn publish_json<T: Serialize>(&self, queue: &str, payload: &T) -> Result<(), MessagingError> {
        let body = serde_json::to_vec(payload)?;
        self.publish(queue, body, JSON_CONTENT_TYPE, None, None).await
    }

    /// Answers on a requester's reply queue.
    ///
    /// Reply queues are owned by the requester (often exclusive and
    /// broker-named), so they are never declared from here.
    pub async fn reply(
        &self,
        reply_to: &str,
        body: Vec<u8>,
        correlation_id: Option<&str>,
    ) -> Result<(), MessagingError> {
        let mut envelope = Envelope::new(reply_to, body);
        envelope.correlation_id = correlation_id.map(str::to_string);
        self.send(envelope, false).await
    }

    async fn send(&self, envelope: Envelope, declare: bool) -> Result<(), MessagingError> {
        let mut registry = self.registry.lock().await;
        if declare && !registry.is_declared(&envelope.queue) {
            registry
                .declare(self.channel.as_ref(), QueueDeclaration::new(envelope.queue.clone()))
                .await?;
        }

        let queue = envelope.queue.clone();
        let correlation_id = envelope.correlation_id.clone();
        let size = envelope.body.len();
        self.channel.publish(envelope).await?;
        debug!(queue = %queue, correlation_id = ?correlation_id, bytes = size, "message published");
        Ok(())
    }

    pub async fn close(&self) {
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "failed to close channel");
        }
    }
}
