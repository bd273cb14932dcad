//! Ledger records
//!
//! A record starts life as a client submission (owner-signed intent), is
//! witnessed by the usher (`at`, `received_by`, usher signature,
//! `previous_hash`), and is sealed by `current_hash`. Once sealed it never
//! changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::protocol::ProtocolVersion;
use super::record_type::{is_genesis, RecordKind};
use super::signature::{SignatureEntry, SignerRole};
use crate::error::CoreResult;

/// A ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Hash of the prior record in this scope; `""` for genesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    /// Protocol tag
    pub protocol: String,
    /// Scope name
    pub scope: String,
    /// Replay-protection nonce
    pub nonce: String,
    /// `category:action`
    pub record_type: String,
    /// Type-specific payload
    pub data: Value,
    /// Signer entries, owner first
    #[serde(default)]
    pub signatures: Vec<SignatureEntry>,
    /// Witness timestamp (micromarks since the ledger epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
    /// Witness fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_by: Option<String>,
    /// Hash of the sealed record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_hash: Option<String>,
}

impl Record {
    /// Create an unsigned record
    pub fn new(
        protocol: ProtocolVersion,
        scope: impl Into<String>,
        nonce: impl Into<String>,
        record_type: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            previous_hash: None,
            protocol: protocol.as_str().to_string(),
            scope: scope.into(),
            nonce: nonce.into(),
            record_type: record_type.into(),
            data,
            signatures: Vec::new(),
            at: None,
            received_by: None,
            current_hash: None,
        }
    }

    /// Set the previous hash (client-chained protocols)
    pub fn with_previous_hash(mut self, previous_hash: impl Into<String>) -> Self {
        self.previous_hash = Some(previous_hash.into());
        self
    }

    /// Parsed protocol version
    pub fn protocol_version(&self) -> CoreResult<ProtocolVersion> {
        self.protocol.parse()
    }

    /// Classified record type
    pub fn kind(&self) -> RecordKind {
        RecordKind::classify(&self.record_type)
    }

    /// Whether this is a genesis record
    pub fn is_genesis(&self) -> bool {
        is_genesis(&self.record_type)
    }

    /// Previous hash, `""` when unset
    pub fn previous_hash_str(&self) -> &str {
        self.previous_hash.as_deref().unwrap_or("")
    }

    /// First signature entry with the given role
    pub fn signature_for(&self, role: &SignerRole) -> Option<&SignatureEntry> {
        self.signatures.iter().find(|s| &s.role == role)
    }

    /// Owner fingerprint, if signed by an owner
    pub fn owner_fingerprint(&self) -> Option<&str> {
        self.signature_for(&SignerRole::Owner)
            .map(|s| s.fingerprint.as_str())
    }

    /// Whether the record has been sealed
    pub fn is_sealed(&self) -> bool {
        self.current_hash.as_deref().map_or(false, |h| !h.is_empty())
    }

    /// Convert to a JSON value
    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse from a JSON value
    pub fn from_value(value: Value) -> CoreResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
