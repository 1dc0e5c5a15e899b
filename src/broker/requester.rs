//! Course-detail requests over the broker.
//!
//! A requester owns a channel, a private broker-named reply queue and a
//! background task that reads that queue. Every request gets a fresh
//! correlation id; the reply task routes each reply to the request with the
//! matching id, so any number of requests can be in flight at once on the
//! same reply queue.
//!
//! Once the reply task stops (broker gone, consumer cancelled, requester
//! closed) new requests fail with [`MessagingError::Connection`] before
//! anything is published.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::connection::{Connector, DeliveryStream};
use crate::broker::correlation::PendingReplies;
use crate::broker::envelope::{DetailReply, DetailRequest, JSON_CONTENT_TYPE};
use crate::broker::publisher::Publisher;
use crate::broker::queue::{COURSE_DETAILS_QUEUE, QueueDeclaration};
use crate::catalog::Course;
use crate::utils::MessagingError;

pub struct CourseDetailsRequester {
    publisher: Publisher,
    reply_queue: String,
    pending: PendingReplies,
    dispatcher: JoinHandle<()>,
    closed: AtomicBool,
}

impl CourseDetailsRequester {
    pub async fn connect(connector: &dyn Connector) -> Result<Self, MessagingError> {
        let channel = connector.open_channel().await?;
        let publisher = Publisher::new(channel.clone());

        let reply_queue = publisher.declare(QueueDeclaration::private_reply()).await?;
        let consumer_tag = format!("course-details-requester-{}", Uuid::new_v4().simple());
        let replies = channel.consume(&reply_queue, &consumer_tag).await?;

        let pending = PendingReplies::new();
        let dispatcher = tokio::spawn(dispatch_replies(replies, pending.clone(), reply_queue.clone()));

        info!(reply_queue = %reply_queue, "course detail requester ready");
        Ok(Self {
            publisher,
            reply_queue,
            pending,
            dispatcher,
            closed: AtomicBool::new(false),
        })
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Whether the reply task is still reading the reply queue.
    pub fn is_listening(&self) -> bool {
        !self.pending.is_closed()
    }

    /// Requests currently waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Asks the detail responder for `course_id` and waits up to `timeout`
    /// for the correlated reply.
    ///
    /// Nothing is sent to the broker when the wait is abandoned; a reply that
    /// arrives later is discarded by the reply task.
    pub async fn request_course_details(
        &self,
        course_id: &str,
        timeout: Duration,
    ) -> Result<Course, MessagingError> {
        let pending = self.pending.register()?;
        let body = serde_json::to_vec(&DetailRequest::new(course_id))?;

        self.publisher
            .publish(
                COURSE_DETAILS_QUEUE,
                body,
                JSON_CONTENT_TYPE,
                Some(pending.correlation_id()),
                Some(&self.reply_queue),
            )
            .await?;
        debug!(course_id, correlation_id = pending.correlation_id(), "course detail request sent");

        let reply = match pending.wait(timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(course_id, error = %e, "course detail request abandoned");
                return Err(e);
            }
        };
        DetailReply::decode(&reply.body)?.into_result()
    }

    /// Stops the reply task and closes the channel, which also removes the
    /// reply queue. Requests still waiting fail immediately.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.dispatcher.abort();
        self.pending.close();
        self.publisher.close().await;
    }
}

impl Drop for CourseDetailsRequester {
    /// Dropping without [`close`](Self::close) still releases the reply
    /// queue, on a background task when a runtime is available.
    fn drop(&mut self) {
        self.dispatcher.abort();
        self.pending.close();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let channel = Arc::clone(self.publisher.channel());
        let reply_queue = self.reply_queue.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = channel.close().await {
                        warn!(reply_queue = %reply_queue, error = %e, "failed to close requester channel");
                    }
                });
            }
            Err(_) => warn!(reply_queue = %reply_queue, "requester dropped outside a runtime, channel left open"),
        }
    }
}

async fn dispatch_replies(mut replies: DeliveryStream, pending: PendingReplies, reply_queue: String) {
    while let Some(delivery) = replies.next().await {
        match delivery {
            Ok(envelope) => {
                let correlation_id = envelope.correlation_id.clone();
                if !pending.resolve(envelope) {
                    debug!(reply_queue = %reply_queue, correlation_id = ?correlation_id, "reply with no waiting request discarded");
                }
            }
            Err(e) => {
                warn!(reply_queue = %reply_queue, error = %e, "reply consumer failed");
                break;
            }
        }
    }
    pending.close();
    debug!(reply_queue = %reply_queue, "reply consumer stopped");
}
