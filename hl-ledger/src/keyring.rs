//! Key registry
//!
//! Scope → authorized keys. Mutated only by processing trust records;
//! readers take the lock shared.

use std::collections::{BTreeMap, HashMap};

use hl_core::{scope_lineage, KeyEntry};
use tokio::sync::RwLock;

type ScopeKeys = BTreeMap<String, KeyEntry>;

/// Registry of keys per scope
#[derive(Debug, Default)]
pub struct KeyRegistry {
    scopes: RwLock<HashMap<String, ScopeKeys>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or overwrite a key in its scope
    pub async fn grant(&self, entry: KeyEntry) {
        let mut scopes = self.scopes.write().await;
        scopes
            .entry(entry.scope.clone())
            .or_default()
            .insert(entry.fingerprint.clone(), entry);
    }

    /// Remove a key; returns whether it was present
    pub async fn revoke(&self, scope: &str, fingerprint: &str) -> bool {
        let mut scopes = self.scopes.write().await;
        scopes
            .get_mut(scope)
            .map_or(false, |keys| keys.remove(fingerprint).is_some())
    }

    /// Swap one key for another in a single write; returns whether the old
    /// key was present
    pub async fn replace(&self, scope: &str, old_fingerprint: &str, entry: KeyEntry) -> bool {
        let mut scopes = self.scopes.write().await;
        let keys = scopes.entry(scope.to_string()).or_default();
        let existed = keys.remove(old_fingerprint).is_some();
        keys.insert(entry.fingerprint.clone(), entry);
        existed
    }

    pub async fn lookup(&self, scope: &str, fingerprint: &str) -> Option<KeyEntry> {
        let scopes = self.scopes.read().await;
        scopes.get(scope).and_then(|keys| keys.get(fingerprint).cloned())
    }

    /// Keys of one scope ordered by fingerprint
    pub async fn keys(&self, scope: &str) -> Vec<KeyEntry> {
        let scopes = self.scopes.read().await;
        scopes
            .get(scope)
            .map(|keys| keys.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Entries for a key in `scope` and every ancestor scope, nearest first
    pub async fn lineage_entries(&self, scope: &str, fingerprint: &str) -> Vec<KeyEntry> {
        let scopes = self.scopes.read().await;
        scope_lineage(scope)
            .into_iter()
            .filter_map(|s| scopes.get(s).and_then(|keys| keys.get(fingerprint)).cloned())
            .collect()
    }

    /// Drop every key registered directly in `scope`
    pub async fn remove_scope(&self, scope: &str) {
        self.scopes.write().await.remove(scope);
    }

    /// Copy of every entry, sorted by scope then fingerprint
    pub async fn snapshot(&self) -> Vec<KeyEntry> {
        let scopes = self.scopes.read().await;
        let mut entries: Vec<KeyEntry> = scopes
            .values()
            .flat_map(|keys| keys.values().cloned())
            .collect();
        entries.sort_by(|a, b| (&a.scope, &a.fingerprint).cmp(&(&b.scope, &b.fingerprint)));
        entries
    }

    /// Move every entry of `other` into this registry
    pub async fn absorb(&self, other: KeyRegistry) {
        let other = other.scopes.into_inner();
        let mut scopes = self.scopes.write().await;
        for (scope, keys) in other {
            scopes.entry(scope).or_default().extend(keys);
        }
    }

    pub async fn clear(&self) {
        self.scopes.write().await.clear();
    }
}
