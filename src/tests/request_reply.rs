//! End-to-end request/reply through the in-process broker: a raw client on
//! one side, the detail responder and catalog store on the other.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;

use crate::broker::queue::COURSE_DETAILS_QUEUE;
use crate::broker::{
    Connector, CourseDetailsRequester, DetailResponder, Envelope, InMemoryBroker, Notifier,
    QueueDeclaration, ResponderState,
};
use crate::catalog::{CatalogService, Course, CourseStore, NewCourse};
use crate::utils::MessagingError;

fn abc123() -> Course {
    Course {
        id: "abc123".to_string(),
        title: "Distributed Systems".to_string(),
        description: "Queues, replies and everything in between".to_string(),
        category: "engineering".to_string(),
        price: 99.0,
        created_at: "2024-02-10T08:30:00+00:00".to_string(),
    }
}

#[tokio::test]
async fn detail_request_gets_reply_on_reply_to_queue_with_same_correlation_id() {
    let broker = InMemoryBroker::new();
    let store = CourseStore::temporary().unwrap();
    store.insert_course(&abc123()).unwrap();

    let responder = DetailResponder::new(&broker, store).await.unwrap();
    let mut state = responder.state();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = responder.spawn(shutdown_rx);
    state.wait_for(|s| *s == ResponderState::Consuming).await.unwrap();

    let client = broker.open_channel().await.unwrap();
    client.declare_queue(&QueueDeclaration::new("reply-q-1")).await.unwrap();
    let mut replies = client.consume("reply-q-1", "e2e").await.unwrap();

    client
        .publish(
            Envelope::new(COURSE_DETAILS_QUEUE, br#"{"courseId":"abc123"}"#.to_vec())
                .with_correlation_id("corr-1")
                .with_reply_to("reply-q-1"),
        )
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), replies.next())
        .await
        .expect("reply in time")
        .expect("reply stream open")
        .expect("reply delivered");
    assert_eq!(reply.correlation_id.as_deref(), Some("corr-1"));
    let course: Course = serde_json::from_slice(&reply.body).unwrap();
    assert_eq!(course, abc123());

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn course_created_through_the_service_is_served_to_requesters() {
    let broker = InMemoryBroker::new();
    let store = CourseStore::temporary().unwrap();
    let service = CatalogService::new(store.clone(), Notifier::connect(&broker).await.unwrap());

    let responder = DetailResponder::new(&broker, store).await.unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let _handle = responder.spawn(shutdown_rx);

    let created = service
        .create_course(NewCourse {
            title: "Async Rust".to_string(),
            description: "Futures without tears".to_string(),
            category: "programming".to_string(),
            price: 0.0,
        })
        .await
        .unwrap();

    let requester = CourseDetailsRequester::connect(&broker).await.unwrap();
    let fetched = requester
        .request_course_details(&created.id, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(fetched, created);

    let err = requester
        .request_course_details("does-not-exist", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, MessagingError::NotFound(_)));
}
