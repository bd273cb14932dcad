//! Error types for HL Signer

use hl_core::CoreError;
use thiserror::Error;

/// Signer errors
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("No signature entry for role: {0}")]
    SignerNotFound(String),

    #[error("An owner signature must be present before other roles sign")]
    OwnerSignatureRequired,

    #[error("Record already carries an owner signature from {0}")]
    OwnerAlreadySigned(String),

    #[error("Record already carries current_hash")]
    AlreadyHashed,

    #[error("Previous hash mismatch: expected {expected}, got {actual}")]
    PreviousHashMismatch { expected: String, actual: String },

    #[error("Codec error: {0}")]
    Codec(#[from] CoreError),
}

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;
