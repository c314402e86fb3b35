//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested key or item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The namespace, key, or stream name is invalid.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// An append named a sequence number other than the next one.
    #[error("sequence conflict on {stream}: expected {expected}, got {actual}")]
    SequenceConflict {
        /// The log stream.
        stream: String,
        /// The only sequence number the stream would accept.
        expected: u64,
        /// The sequence number that was offered.
        actual: u64,
    },
}

impl StorageError {
    /// Whether the failure is transient.
    ///
    /// Only reads should be retried on a transient failure; callers must not
    /// retry appends.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
