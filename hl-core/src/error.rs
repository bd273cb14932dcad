//! Error types for HodeauxLedger core
//!
//! Codec and canonicalization failures. Higher layers wrap these in their own
//! error enums.

use thiserror::Error;

/// Core errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Missing or invalid field in a record
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Protocol tag not recognised
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Value cannot be canonicalized
    #[error("Canonicalization error: {0}")]
    Canon(String),

    /// Hash string is not a valid base64 SHA-256 digest
    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    /// Scope name violates naming rules
    #[error("Invalid scope name: {0}")]
    InvalidScope(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
