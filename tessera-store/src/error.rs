//! Store layer errors

use thiserror::Error;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent modification or uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Sink cannot be reached; retryable from the caller's perspective
    #[error("Sink unreachable: {0}")]
    Unreachable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Store Result type
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
