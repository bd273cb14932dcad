//! Signature entries attached to records

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a signer plays on a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignerRole {
    /// Submitter authority
    Owner,
    /// The ledger's witness
    Usher,
    /// Quorum co-signer
    Quorum,
    /// Any other named role
    Other(String),
}

impl SignerRole {
    /// Wire name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Owner => "owner",
            Self::Usher => "usher",
            Self::Quorum => "quorum",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for SignerRole {
    fn from(s: &str) -> Self {
        match s {
            "owner" => Self::Owner,
            "usher" => Self::Usher,
            "quorum" => Self::Quorum,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for SignerRole {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<SignerRole> for String {
    fn from(role: SignerRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for SignerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signer's entry in a record's `signatures` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Signer public key (URL-safe base64)
    pub fingerprint: String,
    /// Role name
    #[serde(rename = "type")]
    pub role: SignerRole,
    /// Detached signature (URL-safe base64); absent while the entry is being signed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl SignatureEntry {
    /// Create a signed entry
    pub fn new(fingerprint: impl Into<String>, role: SignerRole, signature: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            role,
            signature: Some(signature.into()),
        }
    }

    /// Create an entry without a signature value
    pub fn unsigned(fingerprint: impl Into<String>, role: SignerRole) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            role,
            signature: None,
        }
    }

    /// Whether the entry carries a signature value
    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().map_or(false, |s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        let entry = SignatureEntry::new("pk", SignerRole::Usher, "sig");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value, json!({"fingerprint": "pk", "type": "usher", "signature": "sig"}));

        let custom: SignatureEntry =
            serde_json::from_value(json!({"fingerprint": "pk", "type": "notary"})).unwrap();
        assert_eq!(custom.role, SignerRole::Other("notary".to_string()));
        assert!(!custom.is_signed());
    }
}
