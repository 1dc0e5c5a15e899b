//! The `utils` module provides the pieces shared by every other module of the
//! catalog service: the error taxonomy and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{CatalogError, MessagingError};

#[cfg(test)]
mod tests;
