//! Key registry entries

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A key authorized in a scope
///
/// Only created or removed by processing trust records. The fingerprint is
/// the public key itself (URL-safe base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub scope: String,
    pub public_key: String,
    pub fingerprint: String,
    pub roles: BTreeSet<String>,
    /// `at` of the granting record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<String>,
    /// Micromark from which the key is usable; 0 = immediately
    #[serde(default)]
    pub effective_at: u64,
    /// Micromark at which the key lapses; 0 = never
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl KeyEntry {
    pub fn new<I, S>(scope: impl Into<String>, public_key: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let public_key = public_key.into();
        Self {
            scope: scope.into(),
            fingerprint: public_key.clone(),
            public_key,
            roles: roles.into_iter().map(Into::into).collect(),
            issued_at: None,
            effective_at: 0,
            expires_at: 0,
            note: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Whether the key is usable at `now` (micromarks)
    ///
    /// The registry never enforces this itself; readers that care about
    /// expiry call it.
    pub fn is_active(&self, now: u64) -> bool {
        now >= self.effective_at && (self.expires_at == 0 || now < self.expires_at)
    }
}
