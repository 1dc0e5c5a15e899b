//! Fire-and-forget catalog notifications.
//!
//! Nothing acknowledges a notification. Callers that mutate the catalog log a
//! failed notification and carry on; see `CatalogService`.

use serde_json::json;

use crate::broker::connection::Connector;
use crate::broker::envelope::JSON_CONTENT_TYPE;
use crate::broker::publisher::Publisher;
use crate::broker::queue::{CART_QUEUE, COURSES_QUEUE, NEW_COURSES_QUEUE, QueueDeclaration};
use crate::catalog::Course;
use crate::utils::MessagingError;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Free text, e.g. `New course created: Rust 101`.
    Text(String),
    Json(serde_json::Value),
}

impl Notification {
    fn into_body(self) -> Result<Vec<u8>, MessagingError> {
        match self {
            Notification::Text(text) => Ok(text.into_bytes()),
            Notification::Json(value) => Ok(serde_json::to_vec(&value)?),
        }
    }
}

pub struct Notifier {
    publisher: Publisher,
}

impl Notifier {
    pub fn new(publisher: Publisher) -> Self {
        Self { publisher }
    }

    /// Opens a dedicated channel for notifications.
    pub async fn connect(connector: &dyn Connector) -> Result<Self, MessagingError> {
        let channel = connector.open_channel().await?;
        Ok(Self::new(Publisher::new(channel)))
    }

    /// Declares the notification queues other services subscribe to.
    pub async fn declare_queues(&self) -> Result<(), MessagingError> {
        for queue in [NEW_COURSES_QUEUE, COURSES_QUEUE, CART_QUEUE] {
            self.publisher.declare(QueueDeclaration::new(queue)).await?;
        }
        Ok(())
    }

    pub async fn notify(&self, topic: &str, payload: Notification) -> Result<(), MessagingError> {
        let body = payload.into_body()?;
        self.publisher
            .publish(topic, body, JSON_CONTENT_TYPE, None, None)
            .await
    }

    /// Announces a new course twice: as free text on the courses queue and
    /// as the full record on the new-courses queue.
    pub async fn course_created(&self, course: &Course) -> Result<(), MessagingError> {
        self.notify(
            COURSES_QUEUE,
            Notification::Text(format!("New course created: {}", course.title)),
        )
        .await?;
        self.notify(NEW_COURSES_QUEUE, Notification::Json(serde_json::to_value(course)?))
            .await
    }

    pub async fn added_to_cart(&self, course: &Course, user_id: &str) -> Result<(), MessagingError> {
        let payload = json!({
            "action": "add_to_cart",
            "courseId": course.id,
            "userId": user_id,
            "course": course,
        });
        self.notify(CART_QUEUE, Notification::Json(payload)).await
    }

    pub async fn cart_cleared(&self) -> Result<(), MessagingError> {
        self.notify(CART_QUEUE, Notification::Json(json!({ "action": "clear_cart" })))
            .await
    }

    pub async fn close(&self) {
        self.publisher.close().await;
    }
}
