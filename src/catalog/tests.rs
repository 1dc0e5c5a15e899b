use tempfile::tempdir;

use super::model::{Course, CourseFilter, NewCourse};
use super::service::CatalogService;
use super::store::CourseStore;
use crate::broker::queue::{CART_QUEUE, COURSES_QUEUE, NEW_COURSES_QUEUE};
use crate::broker::{InMemoryBroker, Notifier};
use crate::utils::CatalogError;

fn new_course(title: &str, category: &str, price: f64) -> NewCourse {
    NewCourse {
        title: title.to_string(),
        description: format!("{title} from scratch"),
        category: category.to_string(),
        price,
    }
}

async fn service_on(broker: &InMemoryBroker) -> CatalogService {
    let notifier = Notifier::connect(broker).await.unwrap();
    CatalogService::new(CourseStore::temporary().unwrap(), notifier)
}

#[test]
fn store_finds_inserted_course_by_exact_id() {
    let store = CourseStore::temporary().unwrap();
    let course = Course::create(new_course("Rust", "programming", 10.0));
    store.insert_course(&course).unwrap();

    assert_eq!(store.find_course(&course.id).unwrap(), course);
    let prefix = &course.id[..4];
    assert!(matches!(store.find_course(prefix), Err(CatalogError::NotFound(_))));
}

#[test]
fn store_delete_reports_missing_course() {
    let store = CourseStore::temporary().unwrap();
    let course = Course::create(new_course("Rust", "programming", 10.0));
    store.insert_course(&course).unwrap();

    store.delete_course(&course.id).unwrap();
    assert!(matches!(store.delete_course(&course.id), Err(CatalogError::NotFound(_))));
    assert!(matches!(store.find_course(&course.id), Err(CatalogError::NotFound(_))));
}

#[test]
fn store_survives_reopen() {
    let dir = tempdir().expect("create tempdir");
    let path = dir.path().join("catalog");
    let path = path.to_str().unwrap();
    let course = Course::create(new_course("Go", "programming", 5.0));

    {
        let store = CourseStore::open(path).unwrap();
        store.insert_course(&course).unwrap();
    }

    let store = CourseStore::open(path).unwrap();
    assert_eq!(store.find_course(&course.id).unwrap(), course);
}

#[test]
fn second_open_of_a_held_store_reports_it_locked() {
    let dir = tempdir().expect("create tempdir");
    let path = dir.path().join("db");
    let path = path.to_str().unwrap();

    let _held = CourseStore::open(path).unwrap();
    match CourseStore::open(path) {
        Err(CatalogError::StoreLocked(locked)) => assert_eq!(locked, path),
        other => panic!("expected StoreLocked, got {other:?}"),
    }
}

#[test]
fn filter_applies_category_and_inclusive_price_bounds() {
    let store = CourseStore::temporary().unwrap();
    for (title, category, price) in [
        ("Rust", "programming", 10.0),
        ("Go", "programming", 20.0),
        ("Drawing", "art", 15.0),
        ("Zig", "programming", 30.0),
    ] {
        store.insert_course(&Course::create(new_course(title, category, price))).unwrap();
    }

    let all = store.find_courses(&CourseFilter::default()).unwrap();
    assert_eq!(all.len(), 4);

    let filter = CourseFilter {
        category: Some("programming".to_string()),
        min_price: Some(10.0),
        max_price: Some(20.0),
    };
    let mut titles: Vec<String> = store
        .find_courses(&filter)
        .unwrap()
        .into_iter()
        .map(|c| c.title)
        .collect();
    titles.sort();
    assert_eq!(titles, ["Go", "Rust"]);

    let cheap = CourseFilter {
        max_price: Some(15.0),
        ..CourseFilter::default()
    };
    assert_eq!(store.find_courses(&cheap).unwrap().len(), 2);
}

#[test]
fn course_json_uses_camel_case() {
    let course = Course::create(new_course("Rust", "programming", 10.0));
    let value = serde_json::to_value(&course).unwrap();
    assert!(value.get("createdAt").is_some());
    assert_eq!(value["id"], course.id.as_str());
    assert!(chrono::DateTime::parse_from_rfc3339(&course.created_at).is_ok());
}

#[tokio::test]
async fn create_course_persists_and_notifies() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;

    let course = service.create_course(new_course("Rust 101", "programming", 25.0)).await.unwrap();
    assert!(!course.id.is_empty());
    assert_eq!(service.course(&course.id).unwrap(), course);

    let text = broker.drain(COURSES_QUEUE);
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].body_str(), Some("New course created: Rust 101"));
    assert_eq!(broker.drain(NEW_COURSES_QUEUE).len(), 1);
}

#[tokio::test]
async fn create_course_rejects_negative_price() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;

    let err = service.create_course(new_course("Free money", "finance", -1.0)).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidInput(_)));
    let err = service.create_course(new_course("NaN", "finance", f64::NAN)).await.unwrap_err();
    assert!(matches!(err, CatalogError::InvalidInput(_)));
    assert!(service.courses().unwrap().is_empty());
    assert!(!broker.has_queue(COURSES_QUEUE));
}

#[tokio::test]
async fn create_course_succeeds_when_notification_fails() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;
    broker.disconnect();

    let course = service.create_course(new_course("Rust", "programming", 10.0)).await.unwrap();
    assert_eq!(service.course(&course.id).unwrap(), course);
}

#[tokio::test]
async fn add_to_cart_requires_the_course_but_not_the_broker() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;
    let course = service.create_course(new_course("Rust", "programming", 10.0)).await.unwrap();

    let err = service.add_to_cart("missing", "user-1").await.unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));

    assert_eq!(service.add_to_cart(&course.id, "user-1").await.unwrap(), course);
    assert_eq!(broker.drain(CART_QUEUE).len(), 1);

    broker.disconnect();
    assert_eq!(service.add_to_cart(&course.id, "user-1").await.unwrap(), course);
}

#[tokio::test]
async fn clear_cart_publishes_and_tolerates_broker_loss() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;

    service.clear_cart().await;
    let messages = broker.drain(CART_QUEUE);
    assert_eq!(messages[0].body_str(), Some(r#"{"action":"clear_cart"}"#));

    broker.disconnect();
    service.clear_cart().await;
}

#[tokio::test]
async fn delete_course_through_service() {
    let broker = InMemoryBroker::new();
    let service = service_on(&broker).await;
    let course = service.create_course(new_course("Rust", "programming", 10.0)).await.unwrap();

    service.delete_course(&course.id).unwrap();
    assert!(matches!(service.delete_course(&course.id), Err(CatalogError::NotFound(_))));
    assert!(service.filter_courses(&CourseFilter::default()).unwrap().is_empty());
}
