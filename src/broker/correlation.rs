//! Correlation table for request/reply over a shared reply queue.
//!
//! Each outstanding request owns one entry, keyed by its correlation id. The
//! reply consumer resolves entries as replies arrive; an entry that is never
//! resolved is removed when its [`PendingReply`] is dropped, whether it timed
//! out or the caller gave up.
//!
//! Once the reply consumer is gone the table is closed: waiters fail and
//! later registrations are refused, so no request is sent that could never be
//! answered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::broker::envelope::Envelope;
use crate::utils::MessagingError;

#[derive(Debug, Default)]
struct Waiters {
    senders: HashMap<String, oneshot::Sender<Envelope>>,
    closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PendingReplies {
    waiters: Arc<Mutex<Waiters>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an entry under a correlation id no other outstanding request
    /// is using. Fails once the table has been closed.
    pub fn register(&self) -> Result<PendingReply, MessagingError> {
        let mut waiters = self.lock();
        if waiters.closed {
            return Err(MessagingError::Connection("reply consumer is no longer running".to_string()));
        }
        let (sender, receiver) = oneshot::channel();
        let mut correlation_id = Uuid::new_v4().to_string();
        while waiters.senders.contains_key(&correlation_id) {
            correlation_id = Uuid::new_v4().to_string();
        }
        waiters.senders.insert(correlation_id.clone(), sender);
        Ok(PendingReply {
            correlation_id,
            receiver,
            table: self.clone(),
        })
    }

    /// Hands `envelope` to the request waiting on its correlation id.
    /// Returns `false` when nobody is waiting (late, duplicate or foreign
    /// reply).
    pub fn resolve(&self, envelope: Envelope) -> bool {
        let Some(correlation_id) = envelope.correlation_id.as_deref() else {
            return false;
        };
        let waiter = self.lock().senders.remove(correlation_id);
        match waiter {
            Some(sender) => sender.send(envelope).is_ok(),
            None => false,
        }
    }

    /// Fails every waiter and refuses further registrations.
    pub fn close(&self) {
        let mut waiters = self.lock();
        waiters.closed = true;
        waiters.senders.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().senders.is_empty()
    }

    fn remove(&self, correlation_id: &str) {
        self.lock().senders.remove(correlation_id);
    }

    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One outstanding request.
#[derive(Debug)]
pub struct PendingReply {
    correlation_id: String,
    receiver: oneshot::Receiver<Envelope>,
    table: PendingReplies,
}

impl PendingReply {
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Waits for the correlated reply without holding a worker thread.
    pub async fn wait(mut self, timeout: Duration) -> Result<Envelope, MessagingError> {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(MessagingError::Connection(
                "reply consumer stopped before a reply arrived".to_string(),
            )),
            Err(_) => Err(MessagingError::Timeout(self.correlation_id.clone())),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        self.table.remove(&self.correlation_id);
    }
}
