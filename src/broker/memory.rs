//! In-process broker.
//!
//! This backend keeps named queues in memory and follows the AMQP semantics
//! the rest of the crate relies on:
//! - identical redeclaration is a no-op, conflicting flags are rejected
//! - an empty queue name yields a generated `amq.gen-*` name
//! - exclusive queues belong to the declaring channel and vanish with it
//! - messages published to an unknown queue are dropped
//! - consumers on one queue compete round-robin; without consumers messages
//!   are buffered until one attaches
//!
//! Concurrency note: all state sits behind one mutex that is never held across
//! an `.await`. Delivery to consumers goes through unbounded channels, so
//! publishing never blocks on a slow consumer.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc::{self, UnboundedSender, error::SendError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::connection::{Channel, Connector, DeliveryStream};
use crate::broker::envelope::Envelope;
use crate::broker::queue::QueueDeclaration;
use crate::utils::MessagingError;

type ChannelId = u64;

#[derive(Debug)]
struct Consumer {
    tag: String,
    channel: ChannelId,
    sender: UnboundedSender<Envelope>,
}

#[derive(Debug)]
struct Queue {
    declaration: QueueDeclaration,
    owner: Option<ChannelId>,
    backlog: VecDeque<Envelope>,
    consumers: Vec<Consumer>,
    next_consumer: usize,
    /// Set once a consumer attached; auto-delete only applies after that.
    had_consumer: bool,
}

impl Queue {
    fn new(declaration: QueueDeclaration, owner: Option<ChannelId>) -> Self {
        Self {
            declaration,
            owner,
            backlog: VecDeque::new(),
            consumers: Vec::new(),
            next_consumer: 0,
            had_consumer: false,
        }
    }

    fn deliver(&mut self, mut envelope: Envelope) {
        while !self.consumers.is_empty() {
            let idx = self.next_consumer % self.consumers.len();
            match self.consumers[idx].sender.send(envelope) {
                Ok(()) => {
                    self.next_consumer = idx + 1;
                    return;
                }
                Err(SendError(returned)) => {
                    // receiver dropped; forget the consumer and try the next one
                    envelope = returned;
                    let gone = self.consumers.remove(idx);
                    debug!(queue = %self.declaration.name, consumer = %gone.tag, "consumer gone");
                }
            }
        }
        self.backlog.push_back(envelope);
    }

    fn attach(&mut self, consumer: Consumer) {
        while let Some(envelope) = self.backlog.pop_front() {
            if let Err(SendError(envelope)) = consumer.sender.send(envelope) {
                self.backlog.push_front(envelope);
                return;
            }
        }
        self.had_consumer = true;
        self.consumers.push(consumer);
    }
}

#[derive(Debug)]
struct BrokerState {
    queues: HashMap<String, Queue>,
    connected: bool,
    next_channel: ChannelId,
}

/// Handle to an in-process broker. Clones share the same queues.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                queues: HashMap::new(),
                connected: true,
                next_channel: 1,
            })),
        }
    }

    /// Simulates losing the broker: consumers' streams end and every later
    /// operation fails.
    pub fn disconnect(&self) {
        let mut state = lock(&self.state);
        state.connected = false;
        for queue in state.queues.values_mut() {
            queue.consumers.clear();
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn has_queue(&self, name: &str) -> bool {
        lock(&self.state).queues.contains_key(name)
    }

    pub fn declaration(&self, name: &str) -> Option<QueueDeclaration> {
        lock(&self.state)
            .queues
            .get(name)
            .map(|q| q.declaration.clone())
    }

    /// Messages waiting on `name` for a consumer.
    pub fn message_count(&self, name: &str) -> Option<usize> {
        lock(&self.state).queues.get(name).map(|q| q.backlog.len())
    }

    pub fn consumer_count(&self, name: &str) -> Option<usize> {
        lock(&self.state).queues.get(name).map(|q| q.consumers.len())
    }

    /// Deletes `name` from the broker side; its consumers' streams end as
    /// they would when an operator deletes a queue.
    pub fn delete_queue(&self, name: &str) -> bool {
        let removed = lock(&self.state).queues.remove(name).is_some();
        if removed {
            debug!(queue = %name, "queue deleted");
        }
        removed
    }

    /// Removes and returns buffered messages, oldest first.
    pub fn drain(&self, name: &str) -> Vec<Envelope> {
        lock(&self.state)
            .queues
            .get_mut(name)
            .map(|q| q.backlog.drain(..).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for InMemoryBroker {
    async fn open_channel(&self) -> Result<Arc<dyn Channel>, MessagingError> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(MessagingError::Connection("broker unreachable".to_string()));
        }
        let id = state.next_channel;
        state.next_channel += 1;
        debug!(channel_id = id, "in-process channel opened");
        Ok(Arc::new(MemoryChannel {
            id,
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<(), MessagingError> {
        self.disconnect();
        Ok(())
    }
}

pub struct MemoryChannel {
    id: ChannelId,
    state: Arc<Mutex<BrokerState>>,
    closed: AtomicBool,
}

impl MemoryChannel {
    fn usable(&self) -> Result<MutexGuard<'_, BrokerState>, String> {
        if self.closed.load(Ordering::Acquire) {
            return Err("channel closed".to_string());
        }
        let state = lock(&self.state);
        if !state.connected {
            return Err("broker unreachable".to_string());
        }
        Ok(state)
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_queue(&self, declaration: &QueueDeclaration) -> Result<String, MessagingError> {
        let mut state = self.usable().map_err(MessagingError::Connection)?;

        let name = if declaration.name.is_empty() {
            format!("amq.gen-{}", Uuid::new_v4().simple())
        } else {
            declaration.name.clone()
        };

        if let Some(existing) = state.queues.get(&name) {
            if existing.owner.is_some_and(|owner| owner != self.id) {
                return Err(MessagingError::Declaration {
                    queue: name,
                    reason: "RESOURCE_LOCKED - exclusive queue owned by another channel".to_string(),
                });
            }
            return match existing.declaration.conflict_with(declaration) {
                None => Ok(name),
                Some(reason) => Err(MessagingError::Declaration {
                    queue: name,
                    reason: format!("PRECONDITION_FAILED - {reason}"),
                }),
            };
        }

        let owner = declaration.exclusive.then_some(self.id);
        let stored = QueueDeclaration {
            name: name.clone(),
            ..declaration.clone()
        };
        state.queues.insert(name.clone(), Queue::new(stored, owner));
        Ok(name)
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), MessagingError> {
        let mut state = self.usable().map_err(|reason| MessagingError::Publish {
            queue: envelope.queue.clone(),
            reason,
        })?;

        match state.queues.get_mut(&envelope.queue) {
            Some(queue) => queue.deliver(envelope),
            None => warn!(queue = %envelope.queue, "no such queue, message dropped"),
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<DeliveryStream, MessagingError> {
        let mut state = self.usable().map_err(MessagingError::Connection)?;

        let target = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| MessagingError::Connection(format!("NOT_FOUND - no queue '{queue}'")))?;
        if target.owner.is_some_and(|owner| owner != self.id) {
            return Err(MessagingError::Connection(format!(
                "RESOURCE_LOCKED - cannot consume from exclusive queue '{queue}'"
            )));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        target.attach(Consumer {
            tag: consumer_tag.to_string(),
            channel: self.id,
            sender,
        });

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|envelope| (Ok(envelope), receiver))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) -> Result<(), MessagingError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut state = lock(&self.state);
        let id = self.id;
        for queue in state.queues.values_mut() {
            queue.consumers.retain(|c| c.channel != id);
        }
        state.queues.retain(|name, queue| {
            let owned = queue.owner == Some(id);
            let abandoned = queue.declaration.auto_delete && queue.had_consumer && queue.consumers.is_empty();
            if owned || abandoned {
                debug!(queue = %name, "queue deleted with its channel");
            }
            !(owned || abandoned)
        });
        Ok(())
    }
}

fn lock(state: &Mutex<BrokerState>) -> MutexGuard<'_, BrokerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
