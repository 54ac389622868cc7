//! Storage error types.

/// Errors surfaced by storage backends and the persistence gateway.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File-system access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage service could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The storage service answered with an unexpected status.
    #[error("Storage service returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Canvas not found: {0}")]
    CanvasNotFound(String),

    #[error("Canvas already exists: {0}")]
    CanvasExists(String),

    #[error("Invalid canvas name: {0:?}")]
    InvalidName(String),
}

impl StorageError {
    /// Whether this error should be shown to the user as-is (as opposed to
    /// a transient infrastructure failure).
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            StorageError::CanvasNotFound(_)
                | StorageError::CanvasExists(_)
                | StorageError::InvalidName(_)
        )
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
