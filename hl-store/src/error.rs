//! HL Store Error Types

use hl_core::CoreError;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Scope has no records
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// Another record already attaches at this position (a fork)
    #[error("Attachment {key} already exists in scope '{scope}'")]
    AttachmentExists { scope: String, key: String },

    /// Filesystem or backend I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Record could not be encoded for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored data is unreadable or inconsistent
    #[error("Corrupt storage: {0}")]
    Corrupt(String),
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Storage result type
pub type StoreResult<T> = Result<T, StoreError>;
