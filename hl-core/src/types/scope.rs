//! Scope names
//!
//! `""` is the root scope. Children are `.` delimited, each segment made of
//! ASCII letters, digits, `-` and `_`.

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SCOPE_LENGTH, ROOT_SCOPE, SCOPE_SEPARATOR};
use crate::error::{CoreError, CoreResult};

/// A child scope declared by a `scope:create` record in its parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDeclaration {
    /// Declared child scope
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owner fingerprint of the declaring record
    pub created_by: String,
    /// Scope holding the declaring record
    pub declared_in: String,
    /// `at` of the declaring record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_at: Option<String>,
    /// Keys the child's genesis is expected to carry
    #[serde(default)]
    pub keys: Vec<String>,
}

/// Validate a scope name
pub fn validate_scope(scope: &str) -> CoreResult<()> {
    if scope == ROOT_SCOPE {
        return Ok(());
    }
    if scope.len() > MAX_SCOPE_LENGTH {
        return Err(CoreError::InvalidScope(format!(
            "scope exceeds {} characters",
            MAX_SCOPE_LENGTH
        )));
    }
    for segment in scope.split(SCOPE_SEPARATOR) {
        if segment.is_empty() {
            return Err(CoreError::InvalidScope(format!("empty segment in '{}'", scope)));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidScope(format!(
                "illegal character in segment '{}'",
                segment
            )));
        }
    }
    Ok(())
}

/// Parent of a scope; `None` for the root
pub fn parent_scope(scope: &str) -> Option<&str> {
    if scope == ROOT_SCOPE {
        return None;
    }
    match scope.rfind(SCOPE_SEPARATOR) {
        Some(idx) => Some(&scope[..idx]),
        None => Some(ROOT_SCOPE),
    }
}

/// The scope itself followed by each ancestor up to and including the root
pub fn scope_lineage(scope: &str) -> Vec<&str> {
    let mut lineage = vec![scope];
    let mut current = scope;
    while let Some(parent) = parent_scope(current) {
        lineage.push(parent);
        current = parent;
    }
    lineage
}
