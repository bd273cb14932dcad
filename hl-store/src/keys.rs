//! Storage keys
//!
//! A record is stored under the hash of the record it attaches to, so the
//! blob for position N+1 is found from `current_hash(N)` alone. The genesis
//! record uses a fixed sentinel.

use std::fmt;

use hl_core::{Record, RecordHash, GENESIS_ATTACHMENT_KEY, ROOT_SCOPE};

use crate::error::{StoreError, StoreResult};

/// Directory name used for the root scope
pub const ROOT_SCOPE_DIR: &str = "~";

/// Position a record attaches to within its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKey {
    Genesis,
    After(RecordHash),
}

impl AttachmentKey {
    /// Key for a witnessed record
    pub fn for_record(record: &Record) -> StoreResult<Self> {
        if record.is_genesis() {
            return Ok(Self::Genesis);
        }
        let previous = record.previous_hash_str();
        if previous.is_empty() {
            return Err(StoreError::Serialization(format!(
                "non-genesis record in scope '{}' has no previous_hash",
                record.scope
            )));
        }
        Ok(Self::After(RecordHash::from_base64(previous)?))
    }

    /// Storage name: the sentinel or lowercase hex of the parent digest
    pub fn storage_name(&self) -> String {
        match self {
            Self::Genesis => GENESIS_ATTACHMENT_KEY.to_string(),
            Self::After(hash) => hash.to_hex(),
        }
    }

    /// Parse a storage name
    pub fn parse(name: &str) -> StoreResult<Self> {
        if name == GENESIS_ATTACHMENT_KEY {
            return Ok(Self::Genesis);
        }
        Ok(Self::After(RecordHash::from_hex(name)?))
    }
}

impl fmt::Display for AttachmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_name())
    }
}

/// Directory name for a scope
pub fn scope_dir_name(scope: &str) -> &str {
    if scope == ROOT_SCOPE {
        ROOT_SCOPE_DIR
    } else {
        scope
    }
}

/// Scope for a directory name
pub fn scope_from_dir_name(name: &str) -> &str {
    if name == ROOT_SCOPE_DIR {
        ROOT_SCOPE
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_names() {
        let hash = RecordHash::sha256(b"parent");
        let key = AttachmentKey::After(hash);
        let name = key.storage_name();

        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(AttachmentKey::parse(&name).unwrap(), key);
        assert_eq!(AttachmentKey::parse("genesis").unwrap(), AttachmentKey::Genesis);
        assert!(AttachmentKey::parse("not-hex").is_err());
    }

    #[test]
    fn test_root_scope_dir() {
        assert_eq!(scope_dir_name(""), "~");
        assert_eq!(scope_from_dir_name("~"), "");
        assert_eq!(scope_dir_name("self.abc"), "self.abc");
    }
}
