//! Logging Standards and Conventions
//!
//! Logging conventions shared by all HodeauxLedger crates.
//!
//! # Log Levels
//!
//! | Level | Usage | Examples |
//! |-------|-------|----------|
//! | ERROR | Data corruption, unrecoverable storage failure | Broken chain on disk, blob write failed |
//! | WARN  | Rejections, recoverable issues | Bad signature, stale tip repaired |
//! | INFO  | Significant state changes | Record committed, scope rebuilt |
//! | DEBUG | Detailed operation flow | Lock acquired, handler planned |
//! | TRACE | Fine-grained debugging | Canonical payloads |
//!
//! # Structured Logging Fields
//!
//! Always use structured fields for key information:
//! - `scope`: Scope name
//! - `record_type`: Record type
//! - `hash`: Record hash (base64)
//! - `index`: Position in a chain
//! - `error`: Error message
//!
//! ```ignore
//! use tracing::{info, warn};
//!
//! info!(scope = %record.scope, hash = %hash, "Record committed");
//! warn!(target: targets::SECURITY, scope = %scope, error = %e, "Signature rejected");
//! ```
//!
//! Signature, authorization and witness rejections go to the
//! [`targets::SECURITY`] target so they can be routed separately.

use serde::{Deserialize, Serialize};

/// Log level enumeration matching tracing levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracing targets
pub mod targets {
    /// Signature, authorization and witness rejections
    pub const SECURITY: &str = "hl::security";
}

/// Maximum bytes of a canonical payload logged at TRACE
pub const MAX_PAYLOAD_LOG_BYTES: usize = 256;

/// Truncate a payload for logging
pub fn truncate_payload(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(MAX_PAYLOAD_LOG_BYTES)];
    let mut out = String::from_utf8_lossy(shown).into_owned();
    if payload.len() > MAX_PAYLOAD_LOG_BYTES {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("invalid"), None);
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_truncate_payload() {
        assert_eq!(truncate_payload(b"short"), "short");
        let long = vec![b'a'; MAX_PAYLOAD_LOG_BYTES + 10];
        assert!(truncate_payload(&long).ends_with("..."));
    }
}
