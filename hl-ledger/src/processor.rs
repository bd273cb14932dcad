//! Record processing
//!
//! Turning a committed record into derived state happens in two steps:
//! [`RecordProcessor::plan`] reads the record (and current state) and either
//! produces an [`Effect`] or refuses; [`RecordProcessor::apply`] performs the
//! effect and cannot fail. The engine plans before persisting and applies
//! after, so a record the handlers refuse never half-mutates anything.

use hl_core::{
    parent_scope, KeyAction, KeyEntry, PolicyAction, Record, RecordKind, RootAction,
    ScopeAction, ScopeDeclaration, TrustPolicy, CORE_ROLE,
};
use hl_signer::canonical_fingerprint;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::state::LedgerState;

pub(crate) const KEY_FIELDS: &[&str] = &["key", "pk", "public_key"];
const OLD_KEY_FIELDS: &[&str] = &["old_key", "old"];
const ROLE_FIELDS: &[&str] = &["roles", "r"];
const EXPIRES_FIELDS: &[&str] = &["exp", "expiration_micromark"];
const EFFECTIVE_FIELDS: &[&str] = &["eff", "effective_micromark"];
const NOTE_FIELDS: &[&str] = &["note", "n"];
const SCOPE_FIELDS: &[&str] = &["scope", "new_scope", "ns"];

/// A planned state change
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    GrantKey(KeyEntry),
    RevokeKey { scope: String, fingerprint: String },
    ReplaceKey { old_fingerprint: String, entry: KeyEntry },
    SetPolicy { scope: String, policy: TrustPolicy },
    DeclareScope(ScopeDeclaration),
    /// No handler for this record type
    Ignore { category: String, action: String },
}

/// What applying an effect did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    KeyGranted { fingerprint: String },
    KeyRevoked { fingerprint: String, existed: bool },
    KeyReplaced { old_fingerprint: String, fingerprint: String },
    PolicySet,
    ScopeDeclared { scope: String },
    Ignored { category: String, action: String },
}

/// Record type handlers
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordProcessor;

impl RecordProcessor {
    /// Decide what a record does to `state` without changing it
    pub async fn plan(state: &LedgerState, record: &Record) -> LedgerResult<Effect> {
        let effect = match record.kind() {
            RecordKind::Genesis => {
                let mut entry = key_entry(record, data_fingerprint(record, KEY_FIELDS)?)?;
                entry.roles = [CORE_ROLE.to_string()].into_iter().collect();
                Effect::GrantKey(entry)
            }
            RecordKind::Key(KeyAction::Grant) | RecordKind::Root(RootAction::Add) => {
                Effect::GrantKey(key_entry(record, data_fingerprint(record, KEY_FIELDS)?)?)
            }
            RecordKind::Key(KeyAction::Revoke) | RecordKind::Root(RootAction::Revoke) => {
                Effect::RevokeKey {
                    scope: record.scope.clone(),
                    fingerprint: data_fingerprint(record, KEY_FIELDS)?,
                }
            }
            RecordKind::Root(RootAction::Update) => Effect::ReplaceKey {
                old_fingerprint: data_fingerprint(record, OLD_KEY_FIELDS)?,
                entry: key_entry(record, data_fingerprint(record, KEY_FIELDS)?)?,
            },
            RecordKind::Policy(PolicyAction::Set) => {
                let policy = TrustPolicy::from_data(&record.data).map_err(|e| {
                    LedgerError::ProcessingFailed(format!("invalid policy payload: {}", e))
                })?;
                Effect::SetPolicy {
                    scope: record.scope.clone(),
                    policy,
                }
            }
            RecordKind::Scope(ScopeAction::Create) => {
                Effect::DeclareScope(plan_scope_create(state, record).await?)
            }
            RecordKind::Unknown { category, action } => Effect::Ignore { category, action },
        };
        debug!(scope = %record.scope, record_type = %record.record_type, ?effect, "Record planned");
        Ok(effect)
    }

    /// Perform a planned effect
    pub async fn apply(state: &LedgerState, effect: Effect) -> Outcome {
        match effect {
            Effect::GrantKey(entry) => {
                let fingerprint = entry.fingerprint.clone();
                info!(scope = %entry.scope, fingerprint = %fingerprint, roles = ?entry.roles, "Key granted");
                state.keyring().grant(entry).await;
                Outcome::KeyGranted { fingerprint }
            }
            Effect::RevokeKey { scope, fingerprint } => {
                let existed = state.keyring().revoke(&scope, &fingerprint).await;
                info!(scope = %scope, fingerprint = %fingerprint, existed, "Key revoked");
                Outcome::KeyRevoked {
                    fingerprint,
                    existed,
                }
            }
            Effect::ReplaceKey {
                old_fingerprint,
                entry,
            } => {
                let fingerprint = entry.fingerprint.clone();
                let scope = entry.scope.clone();
                state
                    .keyring()
                    .replace(&scope, &old_fingerprint, entry)
                    .await;
                info!(scope = %scope, old = %old_fingerprint, new = %fingerprint, "Key replaced");
                Outcome::KeyReplaced {
                    old_fingerprint,
                    fingerprint,
                }
            }
            Effect::SetPolicy { scope, policy } => {
                state.set_policy(&scope, policy).await;
                info!(scope = %scope, "Policy set");
                Outcome::PolicySet
            }
            Effect::DeclareScope(declaration) => {
                let scope = declaration.scope.clone();
                state.declare_scope(declaration).await;
                info!(scope = %scope, "Scope declared");
                Outcome::ScopeDeclared { scope }
            }
            Effect::Ignore { category, action } => {
                debug!(category = %category, action = %action, "No handler, record ignored");
                Outcome::Ignored { category, action }
            }
        }
    }
}

async fn plan_scope_create(state: &LedgerState, record: &Record) -> LedgerResult<ScopeDeclaration> {
    let child = data_str(&record.data, SCOPE_FIELDS)
        .ok_or_else(|| LedgerError::ProcessingFailed("scope:create missing data.scope".to_string()))?;
    hl_core::validate_scope(child)
        .map_err(|e| LedgerError::ProcessingFailed(e.to_string()))?;
    if parent_scope(child) != Some(record.scope.as_str()) {
        return Err(LedgerError::ProcessingFailed(format!(
            "'{}' is not a direct child of '{}'",
            child, record.scope
        )));
    }
    if state.declaration(child).await.is_some() {
        return Err(LedgerError::ProcessingFailed(format!(
            "scope '{}' already declared",
            child
        )));
    }

    let keys = match record.data.get("keys") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| {
                        LedgerError::ProcessingFailed("data.keys must hold strings".to_string())
                    })
                    .and_then(fingerprint)
            })
            .collect::<LedgerResult<Vec<_>>>()?,
        Some(_) => {
            return Err(LedgerError::ProcessingFailed(
                "data.keys must be an array".to_string(),
            ))
        }
    };

    Ok(ScopeDeclaration {
        scope: child.to_string(),
        description: data_str(&record.data, &["description"]).map(str::to_string),
        created_by: record.owner_fingerprint().unwrap_or_default().to_string(),
        declared_in: record.scope.clone(),
        declared_at: record.at.clone(),
        keys,
    })
}

/// Build the key entry a grant-like record creates
fn key_entry(record: &Record, public_key: String) -> LedgerResult<KeyEntry> {
    let roles = match data_field(&record.data, ROLE_FIELDS) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    LedgerError::ProcessingFailed("roles must be strings".to_string())
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?,
        Some(_) => {
            return Err(LedgerError::ProcessingFailed(
                "roles must be an array".to_string(),
            ))
        }
    };

    let mut entry = KeyEntry::new(record.scope.clone(), public_key, roles);
    entry.issued_at = record.at.clone();
    entry.expires_at = data_u64(&record.data, EXPIRES_FIELDS)?;
    entry.effective_at = data_u64(&record.data, EFFECTIVE_FIELDS)?;
    entry.note = data_str(&record.data, NOTE_FIELDS).map(str::to_string);
    Ok(entry)
}

fn data_field<'a>(data: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| data.get(*name))
}

pub(crate) fn data_str<'a>(data: &'a Value, names: &[&str]) -> Option<&'a str> {
    data_field(data, names).and_then(Value::as_str)
}

fn data_key(record: &Record, names: &[&str]) -> LedgerResult<String> {
    data_str(&record.data, names)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            LedgerError::ProcessingFailed(format!(
                "{} missing data.{}",
                record.record_type, names[0]
            ))
        })
}

/// A data key in its single fingerprint form
fn data_fingerprint(record: &Record, names: &[&str]) -> LedgerResult<String> {
    fingerprint(&data_key(record, names)?)
}

pub(crate) fn fingerprint(public_key: &str) -> LedgerResult<String> {
    canonical_fingerprint(public_key)
        .map_err(|e| LedgerError::ProcessingFailed(format!("data key rejected: {}", e)))
}

/// Unsigned integer field; absent means 0, decimal strings are accepted
fn data_u64(data: &Value, names: &[&str]) -> LedgerResult<u64> {
    match data_field(data, names) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            LedgerError::ProcessingFailed(format!("data.{} must be a non-negative integer", names[0]))
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| {
            LedgerError::ProcessingFailed(format!("data.{} must be a non-negative integer", names[0]))
        }),
        Some(_) => Err(LedgerError::ProcessingFailed(format!(
            "data.{} must be a non-negative integer",
            names[0]
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::ProtocolVersion;
    use hl_signer::HlSigningKey;
    use serde_json::json;

    fn record(scope: &str, record_type: &str, data: Value) -> Record {
        let mut record = Record::new(ProtocolVersion::V1, scope, "n", record_type, data);
        record.at = Some("77".to_string());
        record
    }

    fn pk() -> String {
        HlSigningKey::generate().fingerprint().to_string()
    }

    #[tokio::test]
    async fn test_genesis_grants_core() {
        let state = LedgerState::new();
        let key = pk();
        let effect = RecordProcessor::plan(&state, &record("", "genesis", json!({"key": key})))
            .await
            .unwrap();
        let outcome = RecordProcessor::apply(&state, effect).await;

        assert_eq!(outcome, Outcome::KeyGranted { fingerprint: key.clone() });
        let entry = state.keyring().lookup("", &key).await.unwrap();
        assert!(entry.has_role("core"));
        assert_eq!(entry.issued_at.as_deref(), Some("77"));
    }

    #[tokio::test]
    async fn test_grant_defaults() {
        let state = LedgerState::new();
        let key = pk();
        let effect = RecordProcessor::plan(&state, &record("self", "key:grant", json!({"key": key})))
            .await
            .unwrap();
        match effect {
            Effect::GrantKey(entry) => {
                assert!(entry.roles.is_empty());
                assert_eq!(entry.expires_at, 0);
            }
            other => panic!("unexpected effect {:?}", other),
        }

        let effect = RecordProcessor::plan(
            &state,
            &record("self", "key:grant", json!({"key": key, "roles": ["writer"], "exp": 500})),
        )
        .await
        .unwrap();
        RecordProcessor::apply(&state, effect).await;
        let entry = state.keyring().lookup("self", &key).await.unwrap();
        assert!(entry.has_role("writer"));
        assert_eq!(entry.expires_at, 500);
    }

    #[tokio::test]
    async fn test_bad_payloads_refused_without_mutation() {
        let state = LedgerState::new();
        for (record_type, data) in [
            ("key:grant", json!({})),
            ("key:grant", json!({"key": "not-a-key"})),
            ("key:grant", json!({"key": pk(), "roles": "writer"})),
            ("key:grant", json!({"key": pk(), "exp": -1})),
            ("policy:set", json!({"write": "core"})),
            ("scope:create", json!({})),
        ] {
            let result = RecordProcessor::plan(&state, &record("self", record_type, data)).await;
            assert!(
                matches!(result, Err(LedgerError::ProcessingFailed(_))),
                "{} should be refused",
                record_type
            );
        }
        assert!(state.snapshot().await.keys.is_empty());
    }

    #[tokio::test]
    async fn test_revoke_and_root_update() {
        let state = LedgerState::new();
        let old = pk();
        let new = pk();
        for r in [
            record("", "root:add", json!({"key": old, "roles": ["core"]})),
            record("", "root:update", json!({"old_key": old, "key": new, "roles": ["core"]})),
        ] {
            let effect = RecordProcessor::plan(&state, &r).await.unwrap();
            RecordProcessor::apply(&state, effect).await;
        }
        assert!(state.keyring().lookup("", &old).await.is_none());
        assert!(state.keyring().lookup("", &new).await.is_some());

        let effect = RecordProcessor::plan(&state, &record("", "key:revoke", json!({"key": new})))
            .await
            .unwrap();
        let outcome = RecordProcessor::apply(&state, effect).await;
        assert_eq!(
            outcome,
            Outcome::KeyRevoked {
                fingerprint: new.clone(),
                existed: true
            }
        );
        assert!(state.keyring().lookup("", &new).await.is_none());
    }

    #[tokio::test]
    async fn test_policy_replaced_wholesale() {
        let state = LedgerState::new();
        for data in [
            json!({"write": ["core"], "grant": ["core"]}),
            json!({"write": ["writer"]}),
        ] {
            let effect = RecordProcessor::plan(&state, &record("self", "policy:set", data))
                .await
                .unwrap();
            assert_eq!(RecordProcessor::apply(&state, effect).await, Outcome::PolicySet);
        }
        let policy = state.policy("self").await.unwrap();
        assert_eq!(policy.write, vec!["writer"]);
        assert!(policy.grant.is_empty());
    }

    #[tokio::test]
    async fn test_scope_create() {
        let state = LedgerState::new();
        let create = record("self", "scope:create", json!({"scope": "self.notes", "description": "notes"}));
        let effect = RecordProcessor::plan(&state, &create).await.unwrap();
        RecordProcessor::apply(&state, effect).await;

        let declaration = state.declaration("self.notes").await.unwrap();
        assert_eq!(declaration.declared_in, "self");
        assert_eq!(declaration.description.as_deref(), Some("notes"));

        // twice, or not a direct child
        assert!(RecordProcessor::plan(&state, &create).await.is_err());
        let grandchild = record("self", "scope:create", json!({"scope": "self.a.b"}));
        assert!(RecordProcessor::plan(&state, &grandchild).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_is_ignored() {
        let state = LedgerState::new();
        let effect = RecordProcessor::plan(&state, &record("self", "note:add", json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(
            RecordProcessor::apply(&state, effect).await,
            Outcome::Ignored {
                category: "note".into(),
                action: "add".into()
            }
        );
    }

    #[tokio::test]
    async fn test_padded_key_has_one_fingerprint() {
        let state = LedgerState::new();
        let key = pk();
        let padded = format!("{}=", key);

        for (record_type, data) in [
            ("key:grant", json!({"key": padded, "roles": ["writer"]})),
            ("key:grant", json!({"key": key, "roles": ["writer"]})),
        ] {
            let effect = RecordProcessor::plan(&state, &record("self", record_type, data))
                .await
                .unwrap();
            RecordProcessor::apply(&state, effect).await;
        }
        assert_eq!(state.keyring().keys("self").await.len(), 1);

        let effect = RecordProcessor::plan(&state, &record("self", "key:revoke", json!({"key": padded})))
            .await
            .unwrap();
        let outcome = RecordProcessor::apply(&state, effect).await;
        assert_eq!(
            outcome,
            Outcome::KeyRevoked {
                fingerprint: key,
                existed: true
            }
        );
        assert!(state.keyring().keys("self").await.is_empty());
    }
}
