//! Broker integration: request/reply for course details and catalog
//! notifications.
//!
//! - `connection`: the `Connector`/`Channel` seam every component talks to.
//! - `amqp`: the lapin-backed implementation used in production.
//! - `memory`: an in-process broker with the same queue semantics.
//! - `queue`: queue names, declarations and the per-channel registry.
//! - `publisher`: publishing with implicit declaration.
//! - `requester` / `correlation`: correlated course-detail requests.
//! - `responder`: the long-running detail responder loop.
//! - `notifier`: fire-and-forget catalog notifications.

pub mod amqp;
pub mod connection;
pub mod correlation;
pub mod envelope;
pub mod memory;
pub mod notifier;
pub mod publisher;
pub mod queue;
pub mod requester;
pub mod responder;

pub use amqp::AmqpConnector;
pub use connection::{Channel, Connector, DeliveryStream};
pub use envelope::{DetailReply, DetailRequest, Envelope, JSON_CONTENT_TYPE};
pub use memory::InMemoryBroker;
pub use notifier::{Notification, Notifier};
pub use publisher::Publisher;
pub use queue::QueueDeclaration;
pub use requester::CourseDetailsRequester;
pub use responder::{DetailResponder, Outcome, ResponderState};
