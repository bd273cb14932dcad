//! Scope trust policies
//!
//! A `policy:set` record replaces the scope's policy wholesale. The typed
//! fields cover the `policy.set/1` schema; anything else in the payload is
//! kept in [`TrustPolicy::extra`] so re-serializing never drops data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::record_type::{split_record_type, KeyAction, RecordKind};

/// Per-action signature thresholds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    #[serde(default)]
    pub write: u32,
    #[serde(default)]
    pub grant: u32,
    #[serde(default)]
    pub revoke: u32,
}

/// The current policy of a scope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    /// Roles allowed to append ordinary records
    #[serde(default)]
    pub write: Vec<String>,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub mirror: Vec<String>,
    /// Roles allowed to append `key:grant`
    #[serde(default)]
    pub grant: Vec<String>,
    /// Roles allowed to append `key:revoke`
    #[serde(default)]
    pub revoke: Vec<String>,
    /// Record type patterns accepted in the scope; empty accepts all
    #[serde(default)]
    pub allow_records: Vec<String>,
    /// Record type patterns refused in the scope; wins over `allow_records`
    #[serde(default)]
    pub deny_records: Vec<String>,
    #[serde(default)]
    pub quorum: Quorum,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrustPolicy {
    /// Parse a `policy:set` payload
    pub fn from_data(data: &Value) -> serde_json::Result<Self> {
        serde_json::from_value(data.clone())
    }

    /// Roles permitted to append a record of this type
    ///
    /// An empty list means any registered role qualifies.
    pub fn roles_for(&self, record_type: &str) -> &[String] {
        match RecordKind::classify(record_type) {
            RecordKind::Key(KeyAction::Grant) => &self.grant,
            RecordKind::Key(KeyAction::Revoke) => &self.revoke,
            _ => &self.write,
        }
    }

    /// Whether the allow/deny patterns accept a record type
    pub fn accepts_record_type(&self, record_type: &str) -> bool {
        if self
            .deny_records
            .iter()
            .any(|p| pattern_matches(p, record_type))
        {
            return false;
        }
        self.allow_records.is_empty()
            || self
                .allow_records
                .iter()
                .any(|p| pattern_matches(p, record_type))
    }
}

/// Match `*`, `category:*` or an exact record type
fn pattern_matches(pattern: &str, record_type: &str) -> bool {
    if pattern == "*" || pattern == record_type {
        return true;
    }
    match pattern.strip_suffix(":*") {
        Some(category) => split_record_type(record_type).0 == category,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_unknown_fields() {
        let data = json!({
            "write": ["core", "writer"],
            "grant": ["core"],
            "quorum": {"grant": 2},
            "note": "initial policy"
        });
        let policy = TrustPolicy::from_data(&data).unwrap();

        assert_eq!(policy.write, vec!["core", "writer"]);
        assert_eq!(policy.quorum.grant, 2);
        assert_eq!(policy.quorum.write, 0);
        assert_eq!(policy.extra["note"], json!("initial policy"));

        let back = serde_json::to_value(&policy).unwrap();
        assert_eq!(back["note"], json!("initial policy"));
    }

    #[test]
    fn test_roles_for() {
        let policy = TrustPolicy {
            write: vec!["writer".into()],
            grant: vec!["core".into()],
            ..Default::default()
        };
        assert_eq!(policy.roles_for("key:grant"), ["core".to_string()]);
        assert_eq!(policy.roles_for("note:add"), ["writer".to_string()]);
        assert!(policy.roles_for("key:revoke").is_empty());
    }

    #[test]
    fn test_record_patterns() {
        let policy = TrustPolicy {
            allow_records: vec!["key:*".into(), "note:add".into()],
            deny_records: vec!["key:revoke".into()],
            ..Default::default()
        };
        assert!(policy.accepts_record_type("key:grant"));
        assert!(policy.accepts_record_type("note:add"));
        assert!(!policy.accepts_record_type("key:revoke"));
        assert!(!policy.accepts_record_type("note:edit"));
        assert!(TrustPolicy::default().accepts_record_type("anything:goes"));
    }
}
