use tracing::{info, warn};

use crate::broker::Notifier;
use crate::catalog::model::{Course, CourseFilter, NewCourse};
use crate::catalog::store::CourseStore;
use crate::utils::CatalogError;

/// Catalog queries and mutations.
///
/// Mutations publish a notification after the store has been updated. A
/// notification that cannot be published is logged and never fails the
/// mutation.
pub struct CatalogService {
    store: CourseStore,
    notifier: Notifier,
}

impl CatalogService {
    pub fn new(store: CourseStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub async fn create_course(&self, input: NewCourse) -> Result<Course, CatalogError> {
        if !input.price.is_finite() || input.price < 0.0 {
            return Err(CatalogError::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                input.price
            )));
        }

        let course = Course::create(input);
        self.store.insert_course(&course)?;
        info!(course_id = %course.id, title = %course.title, "course created");

        if let Err(e) = self.notifier.course_created(&course).await {
            warn!(course_id = %course.id, error = %e, "course created but notification failed");
        }
        Ok(course)
    }

    pub fn delete_course(&self, id: &str) -> Result<(), CatalogError> {
        self.store.delete_course(id)?;
        info!(course_id = id, "course deleted");
        Ok(())
    }

    pub fn course(&self, id: &str) -> Result<Course, CatalogError> {
        self.store.find_course(id)
    }

    pub fn courses(&self) -> Result<Vec<Course>, CatalogError> {
        self.store.find_courses(&CourseFilter::default())
    }

    pub fn filter_courses(&self, filter: &CourseFilter) -> Result<Vec<Course>, CatalogError> {
        self.store.find_courses(filter)
    }

    /// Fails only when the course does not exist.
    pub async fn add_to_cart(&self, course_id: &str, user_id: &str) -> Result<Course, CatalogError> {
        let course = self.store.find_course(course_id)?;
        if let Err(e) = self.notifier.added_to_cart(&course, user_id).await {
            warn!(course_id, user_id, error = %e, "add-to-cart notification failed");
        }
        Ok(course)
    }

    pub async fn clear_cart(&self) {
        match self.notifier.cart_cleared().await {
            Ok(()) => info!("cart cleared"),
            Err(e) => warn!(error = %e, "clear-cart notification failed"),
        }
    }
}
