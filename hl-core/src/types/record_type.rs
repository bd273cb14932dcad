//! Record type classification
//!
//! `record_type` is `category:action`. The category selects the processing
//! handler; anything unrecognised classifies as [`RecordKind::Unknown`] so
//! callers can ignore it explicitly.

use crate::constants::{GENESIS_RECORD_TYPE, RECORD_TYPE_SEPARATOR};

/// Split a record type on its first separator
///
/// `"key:grant"` → `("key", "grant")`, `"genesis"` → `("genesis", "")`,
/// `"a:b:c"` → `("a", "b:c")`.
pub fn split_record_type(record_type: &str) -> (&str, &str) {
    match record_type.split_once(RECORD_TYPE_SEPARATOR) {
        Some((category, action)) => (category, action),
        None => (record_type, ""),
    }
}

/// Whether a record type starts a scope
pub fn is_genesis(record_type: &str) -> bool {
    record_type == GENESIS_RECORD_TYPE
}

/// Key management actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Grant,
    Revoke,
}

/// Legacy root key actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootAction {
    Add,
    Update,
    Revoke,
}

/// Policy actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Set,
}

/// Scope actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeAction {
    Create,
}

/// Classified record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Genesis,
    Key(KeyAction),
    Root(RootAction),
    Policy(PolicyAction),
    Scope(ScopeAction),
    /// No handler exists; processing ignores the record
    Unknown { category: String, action: String },
}

impl RecordKind {
    /// Classify a record type string
    pub fn classify(record_type: &str) -> Self {
        let (category, action) = split_record_type(record_type);
        match (category, action) {
            ("genesis", "") => Self::Genesis,
            ("key", "grant") => Self::Key(KeyAction::Grant),
            ("key", "revoke") => Self::Key(KeyAction::Revoke),
            ("root", "add") => Self::Root(RootAction::Add),
            ("root", "update") => Self::Root(RootAction::Update),
            ("root", "revoke") => Self::Root(RootAction::Revoke),
            ("policy", "set") => Self::Policy(PolicyAction::Set),
            ("scope", "create") => Self::Scope(ScopeAction::Create),
            _ => Self::Unknown {
                category: category.to_string(),
                action: action.to_string(),
            },
        }
    }

    /// Whether a handler exists for this kind
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_first_separator() {
        assert_eq!(split_record_type("key:grant"), ("key", "grant"));
        assert_eq!(split_record_type("genesis"), ("genesis", ""));
        assert_eq!(split_record_type("a:b:c"), ("a", "b:c"));
        assert_eq!(split_record_type(""), ("", ""));
    }

    #[test]
    fn test_classify() {
        assert_eq!(RecordKind::classify("genesis"), RecordKind::Genesis);
        assert_eq!(RecordKind::classify("key:revoke"), RecordKind::Key(KeyAction::Revoke));
        assert_eq!(RecordKind::classify("root:update"), RecordKind::Root(RootAction::Update));
        assert_eq!(RecordKind::classify("policy:set"), RecordKind::Policy(PolicyAction::Set));
        assert_eq!(RecordKind::classify("scope:create"), RecordKind::Scope(ScopeAction::Create));
    }

    #[test]
    fn test_unknown_is_explicit() {
        let kind = RecordKind::classify("identity:claim");
        assert_eq!(
            kind,
            RecordKind::Unknown {
                category: "identity".to_string(),
                action: "claim".to_string()
            }
        );
        assert!(!kind.is_known());
        // known category, unknown action
        assert!(!RecordKind::classify("key:rotate").is_known());
    }
}
