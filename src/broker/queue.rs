//! Queue names, queue declarations and the per-channel declaration registry.

use std::collections::HashMap;

use tracing::debug;

use crate::broker::connection::Channel;
use crate::utils::MessagingError;

/// Course-detail requests.
pub const COURSE_DETAILS_QUEUE: &str = "get_course_details";
/// Detail requests that could not be decoded.
pub const DEAD_LETTER_QUEUE: &str = "get_course_details.dead_letter";
/// Free-text course-created notifications.
pub const COURSES_QUEUE: &str = "courses_queue";
/// Structured course-created notifications (the course as JSON).
pub const NEW_COURSES_QUEUE: &str = "new_courses_notifications";
pub const CART_QUEUE: &str = "cart_queue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueDeclaration {
    /// Empty asks the broker to generate a name.
    pub name: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub exclusive: bool,
}

impl QueueDeclaration {
    /// A plain queue: not durable, not auto-deleted, not exclusive.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: false,
            auto_delete: false,
            exclusive: false,
        }
    }

    /// A broker-named queue private to the declaring channel and removed when
    /// that channel goes away.
    pub fn private_reply() -> Self {
        Self {
            name: String::new(),
            durable: false,
            auto_delete: true,
            exclusive: true,
        }
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn same_parameters(&self, other: &QueueDeclaration) -> bool {
        self.durable == other.durable
            && self.auto_delete == other.auto_delete
            && self.exclusive == other.exclusive
    }

    /// Describes the first flag that differs, for declaration errors.
    pub fn conflict_with(&self, other: &QueueDeclaration) -> Option<String> {
        let flags = [
            ("durable", self.durable, other.durable),
            ("auto_delete", self.auto_delete, other.auto_delete),
            ("exclusive", self.exclusive, other.exclusive),
        ];
        flags
            .iter()
            .find(|(_, current, requested)| current != requested)
            .map(|(flag, current, requested)| {
                format!("inequivalent arg '{flag}': declared {current}, requested {requested}")
            })
    }
}

/// Queues known to be declared on one channel.
///
/// Nothing is shared between channels: a fresh channel starts with an empty
/// registry and declares again.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    declared: HashMap<String, QueueDeclaration>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `declaration` on `channel` unless this registry already did so
    /// with the same parameters. Returns the queue's actual name.
    pub async fn declare(
        &mut self,
        channel: &dyn Channel,
        declaration: QueueDeclaration,
    ) -> Result<String, MessagingError> {
        if let Some(known) = self.declared.get(&declaration.name) {
            return match known.conflict_with(&declaration) {
                None => Ok(known.name.clone()),
                Some(reason) => Err(MessagingError::Declaration {
                    queue: declaration.name,
                    reason,
                }),
            };
        }

        let name = channel.declare_queue(&declaration).await?;
        debug!(queue = %name, durable = declaration.durable, auto_delete = declaration.auto_delete, "queue declared");
        self.declared.insert(
            name.clone(),
            QueueDeclaration {
                name: name.clone(),
                ..declaration
            },
        );
        Ok(name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.declared.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }
}
