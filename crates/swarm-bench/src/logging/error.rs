//! Error types for the logging and persistence layer.

use thiserror::Error;

/// Result type alias for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised by log writers and the run-file store.
#[derive(Debug, Error)]
pub enum LogError {
    /// An invariant was violated before anything was persisted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying storage was unwritable or unreadable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
