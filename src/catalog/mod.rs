//! The course catalog: records, the sled-backed store and the catalog
//! operations that publish notifications on mutation.

pub mod model;
pub mod service;
pub mod store;

pub use model::{Course, CourseFilter, NewCourse};
pub use service::CatalogService;
pub use store::CourseStore;

#[cfg(test)]
mod tests;
