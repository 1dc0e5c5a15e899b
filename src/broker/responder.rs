//! The course-detail responder loop.
//!
//! The responder drains the detail request queue on its own task, one
//! delivery at a time in delivery order, looks each course up in the store
//! and answers on the request's reply-to queue with the request's
//! correlation id. Deliveries are acknowledged on receipt, so a crash while
//! handling a request loses it.
//!
//! Per-message failures never end the loop:
//! - malformed requests get no reply; they are copied to
//!   [`DEAD_LETTER_QUEUE`] and logged
//! - unknown courses get an explicit not-found reply
//! - store failures get an `unavailable` reply
//!
//! The loop stops when the shutdown signal flips to `true` (or its sender is
//! dropped) or when the broker ends the delivery stream. The request being
//! handled at that moment is finished first; then the channel is closed.

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::connection::Connector;
use crate::broker::envelope::{DetailReply, DetailRequest, Envelope};
use crate::broker::publisher::Publisher;
use crate::broker::queue::{COURSE_DETAILS_QUEUE, DEAD_LETTER_QUEUE, QueueDeclaration};
use crate::catalog::CourseStore;
use crate::utils::{CatalogError, MessagingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    Idle,
    Declaring,
    Consuming,
    Resolving,
    Replying,
    Stopped,
}

/// What happened to a single delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The course was found and sent back.
    Answered,
    /// A failure reply (not found / unavailable) was sent back.
    Rejected,
    /// The request carried no reply-to address.
    Unanswered,
    /// Publishing the reply failed.
    ReplyFailed,
    /// The request could not be decoded.
    DeadLettered,
}

pub struct DetailResponder {
    publisher: Publisher,
    store: CourseStore,
    consumer_tag: String,
    state: watch::Sender<ResponderState>,
}

impl DetailResponder {
    pub async fn new(connector: &dyn Connector, store: CourseStore) -> Result<Self, MessagingError> {
        let channel = connector.open_channel().await?;
        let (state, _) = watch::channel(ResponderState::Idle);
        Ok(Self {
            publisher: Publisher::new(channel),
            store,
            consumer_tag: format!("course-details-responder-{}", Uuid::new_v4().simple()),
            state,
        })
    }

    /// Follows the loop's state transitions.
    pub fn state(&self) -> watch::Receiver<ResponderState> {
        self.state.subscribe()
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<Result<(), MessagingError>> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs until shutdown. Fails only if the queues cannot be declared or
    /// consumed, or the delivery stream reports a transport error.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), MessagingError> {
        let result = self.serve(&mut shutdown).await;
        self.set_state(ResponderState::Stopped);
        self.publisher.close().await;
        match &result {
            Ok(()) => info!("course detail responder stopped"),
            Err(e) => error!(error = %e, "course detail responder failed"),
        }
        result
    }

    async fn serve(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), MessagingError> {
        self.set_state(ResponderState::Declaring);
        self.publisher.declare(QueueDeclaration::new(COURSE_DETAILS_QUEUE)).await?;
        self.publisher.declare(QueueDeclaration::new(DEAD_LETTER_QUEUE)).await?;
        let mut deliveries = self
            .publisher
            .channel()
            .consume(COURSE_DETAILS_QUEUE, &self.consumer_tag)
            .await?;

        self.set_state(ResponderState::Consuming);
        info!(queue = COURSE_DETAILS_QUEUE, "waiting for course detail requests");

        loop {
            tokio::select! {
                biased;
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                    debug!("shutdown requested");
                    return Ok(());
                }
                delivery = deliveries.next() => match delivery {
                    Some(Ok(envelope)) => {
                        let outcome = self.handle_delivery(envelope).await;
                        debug!(?outcome, "course detail request handled");
                        self.set_state(ResponderState::Consuming);
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        warn!(queue = COURSE_DETAILS_QUEUE, "delivery stream closed by broker");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Resolves one request and replies to it.
    pub async fn handle_delivery(&self, envelope: Envelope) -> Outcome {
        let request = match DetailRequest::decode(&envelope.body) {
            Ok(request) => request,
            Err(e) => {
                warn!(
                    correlation_id = ?envelope.correlation_id,
                    body = %String::from_utf8_lossy(&envelope.body),
                    error = %e,
                    "malformed course detail request, moving to dead-letter queue"
                );
                self.dead_letter(envelope).await;
                return Outcome::DeadLettered;
            }
        };

        self.set_state(ResponderState::Resolving);
        let reply = match self.store.find_course(&request.course_id) {
            Ok(course) => DetailReply::Found(course),
            Err(CatalogError::NotFound(_)) => {
                info!(course_id = %request.course_id, "requested course does not exist");
                DetailReply::not_found(&request.course_id)
            }
            Err(e) => {
                error!(course_id = %request.course_id, error = %e, "course lookup failed");
                DetailReply::unavailable(&request.course_id)
            }
        };

        let Some(reply_to) = envelope.reply_to.as_deref() else {
            debug!(course_id = %request.course_id, "request has no reply-to, nothing to answer");
            return Outcome::Unanswered;
        };

        self.set_state(ResponderState::Replying);
        let body = match serde_json::to_vec(&reply) {
            Ok(body) => body,
            Err(e) => {
                error!(course_id = %request.course_id, error = %e, "failed to encode reply");
                return Outcome::ReplyFailed;
            }
        };
        let correlation_id = envelope.correlation_id.as_deref();
        if let Err(e) = self.publisher.reply(reply_to, body, correlation_id).await {
            warn!(reply_to, correlation_id = ?correlation_id, error = %e, "failed to send course details");
            return Outcome::ReplyFailed;
        }

        match reply {
            DetailReply::Found(_) => Outcome::Answered,
            DetailReply::Failed(_) => Outcome::Rejected,
        }
    }

    async fn dead_letter(&self, envelope: Envelope) {
        let result = self
            .publisher
            .publish(
                DEAD_LETTER_QUEUE,
                envelope.body,
                &envelope.content_type,
                envelope.correlation_id.as_deref(),
                envelope.reply_to.as_deref(),
            )
            .await;
        if let Err(e) = result {
            warn!(error = %e, "failed to dead-letter malformed request");
        }
    }

    fn set_state(&self, state: ResponderState) {
        self.state.send_replace(state);
    }
}
