//! HL Ledger Error Types

use hl_core::CoreError;
use hl_signer::SignerError;
use hl_store::StoreError;
use thiserror::Error;

/// Ledger Result type
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger Error
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or invalid field, or a record that contradicts itself
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Submission already carries `current_hash`
    #[error("Record already hashed")]
    AlreadyHashed,

    /// Canonical submission exceeds the size limit
    #[error("Record too large: {size} bytes exceeds {max}")]
    RecordTooLarge { size: usize, max: usize },

    /// A signature did not verify
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// A required signer role is absent
    #[error("Signer not found: {0}")]
    SignerNotFound(String),

    /// Scope has no genesis yet
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    /// Scope already has a genesis
    #[error("Scope already exists: {0}")]
    ScopeAlreadyExists(String),

    /// Record does not attach to the current tip
    #[error("Previous hash mismatch: expected {expected}, got {actual}")]
    PreviousHashMismatch { expected: String, actual: String },

    /// Owner key lacks a permitted role
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A record handler refused the record
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    /// Stored chain failed verification during rebuild
    #[error("Chain verification failed in scope '{scope}' at index {index}: {reason}")]
    ChainVerificationFailed {
        scope: String,
        index: usize,
        reason: String,
    },

    /// Storage rejected or failed the write
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Create a chain verification error
    pub fn chain(scope: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        Self::ChainVerificationFailed {
            scope: scope.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Usher response code
    pub fn code(&self) -> u16 {
        match self {
            Self::MalformedRecord(_) => 301,
            Self::AlreadyHashed => 310,
            Self::SignatureInvalid(_) | Self::SignerNotFound(_) => 320,
            Self::RecordTooLarge { .. } => 330,
            Self::ScopeNotFound(_) => 340,
            Self::ScopeAlreadyExists(_) => 341,
            Self::PreviousHashMismatch { .. } => 350,
            Self::Unauthorized(_) => 403,
            Self::ProcessingFailed(_) => 422,
            Self::ChainVerificationFailed { .. }
            | Self::PersistenceFailure(_)
            | Self::Config(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Check if the same submission may succeed if retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::PreviousHashMismatch { .. } | LedgerError::PersistenceFailure(_)
        )
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        Self::MalformedRecord(err.to_string())
    }
}

impl From<SignerError> for LedgerError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::AlreadyHashed => Self::AlreadyHashed,
            SignerError::SignerNotFound(role) => Self::SignerNotFound(role),
            SignerError::OwnerSignatureRequired => Self::SignerNotFound("owner".to_string()),
            SignerError::PreviousHashMismatch { expected, actual } => {
                Self::PreviousHashMismatch { expected, actual }
            }
            SignerError::InvalidKey(msg) => Self::SignatureInvalid(msg),
            SignerError::OwnerAlreadySigned(fp) => {
                Self::MalformedRecord(format!("second owner signature from {}", fp))
            }
            SignerError::Codec(e) => Self::MalformedRecord(e.to_string()),
            SignerError::SigningFailed(msg) => Self::Internal(format!("witness signing failed: {}", msg)),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ScopeNotFound(scope) => Self::ScopeNotFound(scope),
            other => Self::PersistenceFailure(other.to_string()),
        }
    }
}
