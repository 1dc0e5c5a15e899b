//! Message envelope and the JSON bodies carried on the detail queues.
//!
//! Correlation id and reply-to travel as broker-native message properties,
//! never inside the body.

use serde::{Deserialize, Serialize};

use crate::catalog::Course;
use crate::utils::MessagingError;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One message on its way to, or delivered from, a named queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub queue: String,
    pub content_type: String,
    /// Present only on request/reply exchanges.
    pub correlation_id: Option<String>,
    /// Queue the responder should answer on. Present only on requests.
    pub reply_to: Option<String>,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(queue: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            queue: queue.into(),
            content_type: JSON_CONTENT_TYPE.to_string(),
            correlation_id: None,
            reply_to: None,
            body,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// The body as text, if it is valid UTF-8.
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Body of a message on the course-detail request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRequest {
    #[serde(rename = "courseId")]
    pub course_id: String,
}

impl DetailRequest {
    pub fn new(course_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
        }
    }

    /// Fails with `MalformedMessage` when the body is not JSON or `courseId`
    /// is missing or not a string.
    pub fn decode(body: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(body).map_err(|e| MessagingError::MalformedMessage(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    /// The store could not be read.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailFailure {
    pub error: FailureKind,
    pub course_id: String,
}

/// Body of a reply on a requester's reply queue: either the course itself or
/// an explicit failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailReply {
    Found(Course),
    Failed(DetailFailure),
}

impl DetailReply {
    pub fn not_found(course_id: &str) -> Self {
        DetailReply::Failed(DetailFailure {
            error: FailureKind::NotFound,
            course_id: course_id.to_string(),
        })
    }

    pub fn unavailable(course_id: &str) -> Self {
        DetailReply::Failed(DetailFailure {
            error: FailureKind::Unavailable,
            course_id: course_id.to_string(),
        })
    }

    pub fn decode(body: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(body).map_err(|e| MessagingError::MalformedMessage(e.to_string()))
    }

    /// Turns the reply into what the original caller sees.
    pub fn into_result(self) -> Result<Course, MessagingError> {
        match self {
            DetailReply::Found(course) => Ok(course),
            DetailReply::Failed(DetailFailure {
                error: FailureKind::NotFound,
                course_id,
            }) => Err(MessagingError::NotFound(course_id)),
            DetailReply::Failed(DetailFailure {
                error: FailureKind::Unavailable,
                ..
            }) => Err(MessagingError::Remote("unavailable".to_string())),
        }
    }
}
