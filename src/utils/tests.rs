use super::error::{CatalogError, MessagingError};
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("bogus");
}

#[test]
fn catalog_error_converts_into_messaging_error() {
    let err: MessagingError = CatalogError::NotFound("abc".to_string()).into();
    assert!(matches!(err, MessagingError::Catalog(CatalogError::NotFound(_))));
    assert_eq!(err.to_string(), "no course found with ID abc");
}

#[test]
fn declaration_error_names_the_queue() {
    let err = MessagingError::Declaration {
        queue: "get_course_details".to_string(),
        reason: "durable mismatch".to_string(),
    };
    assert!(err.to_string().contains("get_course_details"));
}
