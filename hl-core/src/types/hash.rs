//! Record hashes
//!
//! Chain hashes are SHA-256 digests. On the wire they are standard base64
//! with padding (44 characters); on disk they are lowercase hex.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

use crate::constants::{HASH_B64_LENGTH, HASH_BYTES};
use crate::error::{CoreError, CoreResult};

/// 32-byte SHA-256 record hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHash(pub [u8; HASH_BYTES]);

impl RecordHash {
    /// Hash raw bytes
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Parse the wire form
    pub fn from_base64(s: &str) -> CoreResult<Self> {
        if s.len() != HASH_B64_LENGTH {
            return Err(CoreError::InvalidHash(format!(
                "expected {} base64 characters, got {}",
                HASH_B64_LENGTH,
                s.len()
            )));
        }
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| CoreError::InvalidHash(format!("invalid base64: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Parse the on-disk form
    pub fn from_hex(s: &str) -> CoreResult<Self> {
        let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHash(format!("invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }

    fn from_slice(bytes: &[u8]) -> CoreResult<Self> {
        if bytes.len() != HASH_BYTES {
            return Err(CoreError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_BYTES,
                bytes.len()
            )));
        }
        let mut arr = [0u8; HASH_BYTES];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// Wire form
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    /// On-disk form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordHash({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for RecordHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for RecordHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}
