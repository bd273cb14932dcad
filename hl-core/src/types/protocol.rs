//! Protocol versions
//!
//! Each tag pins exactly which fields a submission must carry and which fields
//! the owner signs. The version is always read from the record's `protocol`
//! field, never guessed from the record's shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Record protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// `v1`: `previous_hash` is assigned by the witness and not owner-signed
    #[serde(rename = "v1")]
    V1,
    /// `v1.1`: the client supplies `previous_hash` and signs it
    #[serde(rename = "v1.1")]
    V1_1,
}

impl ProtocolVersion {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V1_1 => "v1.1",
        }
    }

    /// All supported versions
    pub fn all() -> &'static [ProtocolVersion] {
        &[Self::V1, Self::V1_1]
    }

    /// Fields the owner signs, in no particular order
    pub fn signable_fields(&self) -> &'static [&'static str] {
        match self {
            Self::V1 => &["protocol", "scope", "nonce", "record_type", "data"],
            Self::V1_1 => &["previous_hash", "protocol", "scope", "nonce", "record_type", "data"],
        }
    }

    /// Fields a client submission must carry
    pub fn submission_fields(&self) -> &'static [&'static str] {
        match self {
            Self::V1 => &["protocol", "scope", "nonce", "record_type", "data", "signatures"],
            Self::V1_1 => &[
                "previous_hash",
                "protocol",
                "scope",
                "nonce",
                "record_type",
                "data",
                "signatures",
            ],
        }
    }

    /// Fields a witnessed ledger entry must carry
    pub fn entry_fields(&self) -> &'static [&'static str] {
        &[
            "previous_hash",
            "protocol",
            "scope",
            "nonce",
            "record_type",
            "data",
            "signatures",
            "at",
            "current_hash",
        ]
    }

    /// Whether the client chooses the attachment point
    pub fn client_chained(&self) -> bool {
        matches!(self, Self::V1_1)
    }
}

impl FromStr for ProtocolVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(Self::V1),
            "v1.1" => Ok(Self::V1_1),
            other => Err(CoreError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
