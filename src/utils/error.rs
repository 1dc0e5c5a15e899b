//! Error types for the catalog service.
//!
//! `MessagingError` covers everything that can go wrong between this process
//! and the message broker. `CatalogError` covers the course store and the
//! catalog operations built on top of it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    /// The broker could not be reached or a channel could not be opened.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// A queue was redeclared with conflicting parameters, or is locked by
    /// another channel.
    #[error("failed to declare queue `{queue}`: {reason}")]
    Declaration { queue: String, reason: String },

    #[error("failed to publish to `{queue}`: {reason}")]
    Publish { queue: String, reason: String },

    #[error("course `{0}` not found")]
    NotFound(String),

    /// No correlated reply arrived before the caller's deadline.
    #[error("no reply for correlation id `{0}` before timeout")]
    Timeout(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The responder answered with a failure other than not-found.
    #[error("responder reported `{0}`")]
    Remote(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no course found with ID {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The store directory is held by another process, usually a running
    /// `serve`.
    #[error("course store at `{0}` is in use by another process")]
    StoreLocked(String),

    #[error("store error: {0}")]
    Store(#[from] sled::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lapin::Error> for MessagingError {
    fn from(err: lapin::Error) -> Self {
        MessagingError::Connection(err.to_string())
    }
}
