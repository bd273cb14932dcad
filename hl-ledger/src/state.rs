//! Derived ledger state
//!
//! Everything here is a projection of the chains: rebuilding from disk must
//! reproduce it exactly. The engine owns one instance; the rebuilder builds
//! fresh ones and installs them.

use std::collections::{BTreeMap, HashMap};

use hl_core::{scope_lineage, KeyEntry, ScopeDeclaration, TrustPolicy};
use tokio::sync::RwLock;

use crate::keyring::KeyRegistry;

/// Keyring, policies and scope directory
#[derive(Debug, Default)]
pub struct LedgerState {
    keyring: KeyRegistry,
    policies: RwLock<HashMap<String, TrustPolicy>>,
    declarations: RwLock<BTreeMap<String, ScopeDeclaration>>,
}

/// Comparable copy of a [`LedgerState`]
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub keys: Vec<KeyEntry>,
    pub policies: BTreeMap<String, TrustPolicy>,
    pub declarations: BTreeMap<String, ScopeDeclaration>,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyring(&self) -> &KeyRegistry {
        &self.keyring
    }

    /// Policy set directly on `scope`
    pub async fn policy(&self, scope: &str) -> Option<TrustPolicy> {
        self.policies.read().await.get(scope).cloned()
    }

    /// Nearest policy in the scope's lineage
    pub async fn effective_policy(&self, scope: &str) -> Option<TrustPolicy> {
        let policies = self.policies.read().await;
        scope_lineage(scope)
            .into_iter()
            .find_map(|s| policies.get(s).cloned())
    }

    /// Replace a scope's policy wholesale
    pub async fn set_policy(&self, scope: &str, policy: TrustPolicy) {
        self.policies.write().await.insert(scope.to_string(), policy);
    }

    pub async fn declaration(&self, scope: &str) -> Option<ScopeDeclaration> {
        self.declarations.read().await.get(scope).cloned()
    }

    /// Record a child scope; returns false if it was already declared
    pub async fn declare_scope(&self, declaration: ScopeDeclaration) -> bool {
        let mut declarations = self.declarations.write().await;
        if declarations.contains_key(&declaration.scope) {
            return false;
        }
        declarations.insert(declaration.scope.clone(), declaration);
        true
    }

    /// All declared scopes
    pub async fn declarations(&self) -> Vec<ScopeDeclaration> {
        self.declarations.read().await.values().cloned().collect()
    }

    /// Merge a partition built elsewhere into this state
    pub async fn absorb(&self, other: LedgerState) {
        let LedgerState {
            keyring,
            policies,
            declarations,
        } = other;
        self.keyring.absorb(keyring).await;
        self.policies.write().await.extend(policies.into_inner());
        self.declarations
            .write()
            .await
            .extend(declarations.into_inner());
    }

    /// Copy of what `scope`'s own chain produced
    pub async fn scope_partition(&self, scope: &str) -> LedgerState {
        let copy = LedgerState::new();
        for entry in self.keyring.snapshot().await {
            if entry.scope == scope {
                copy.keyring.grant(entry).await;
            }
        }
        if let Some(policy) = self.policy(scope).await {
            copy.set_policy(scope, policy).await;
        }
        copy.declarations.write().await.extend(
            self.declarations
                .read()
                .await
                .iter()
                .filter(|(_, d)| d.declared_in == scope)
                .map(|(s, d)| (s.clone(), d.clone())),
        );
        copy
    }

    /// Swap what `scope`'s chain produced for a rebuilt partition
    pub async fn replace_scope(&self, scope: &str, partition: LedgerState) {
        self.keyring.remove_scope(scope).await;
        self.policies.write().await.remove(scope);
        self.declarations
            .write()
            .await
            .retain(|_, d| d.declared_in != scope);
        self.absorb(partition).await;
    }

    /// Drop all derived state
    pub async fn clear(&self) {
        self.keyring.clear().await;
        self.policies.write().await.clear();
        self.declarations.write().await.clear();
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            keys: self.keyring.snapshot().await,
            policies: self
                .policies
                .read()
                .await
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            declarations: self.declarations.read().await.clone(),
        }
    }
}
