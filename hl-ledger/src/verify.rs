//! Record verification
//!
//! The checks a sealed record must pass before it is accepted, shared by the
//! append path and the bootstrap rebuilder so both apply identical rules.

use hl_core::{logging::targets, scope_lineage, Record, RecordCodec, RecordHash, RecordStage, SignerRole, TrustPolicy};
use hl_signer::{canonical_fingerprint, SignatureEngine};
use tracing::warn;

use crate::config::AuthorizationMode;
use crate::error::{LedgerError, LedgerResult};
use crate::processor::{data_str, KEY_FIELDS};
use crate::state::LedgerState;

/// Seal, signature and authorization checks
#[derive(Debug, Clone, Default)]
pub struct RecordVerifier {
    authorization: AuthorizationMode,
    trusted_witnesses: Vec<String>,
}

impl RecordVerifier {
    pub fn new(authorization: AuthorizationMode, trusted_witnesses: Vec<String>) -> Self {
        let trusted_witnesses = trusted_witnesses
            .into_iter()
            .map(|fp| canonical_fingerprint(&fp).unwrap_or(fp))
            .collect();
        Self {
            authorization,
            trusted_witnesses,
        }
    }

    pub fn authorization(&self) -> AuthorizationMode {
        self.authorization
    }

    /// Structure of a sealed record and its recomputed hash
    pub fn seal(&self, record: &Record) -> LedgerResult<RecordHash> {
        RecordCodec::validate(record, RecordStage::Entry)?;
        Ok(RecordCodec::verify_hash(record)?)
    }

    /// Owner, witness and co-signer signatures
    ///
    /// Every record needs a valid owner signature. Records after genesis
    /// must also carry an usher signature, from a trusted witness when an
    /// allow-list is configured.
    pub fn signatures(&self, record: &Record) -> LedgerResult<()> {
        let owner = record
            .signature_for(&SignerRole::Owner)
            .ok_or_else(|| LedgerError::SignerNotFound(SignerRole::Owner.to_string()))?;
        if !SignatureEngine::verify_role(record, &SignerRole::Owner)? {
            return Err(security(
                record,
                LedgerError::SignatureInvalid(format!(
                    "owner signature from {} does not verify",
                    owner.fingerprint
                )),
            ));
        }

        match record.signature_for(&SignerRole::Usher) {
            None if !record.is_genesis() => {
                return Err(security(
                    record,
                    LedgerError::SignerNotFound(SignerRole::Usher.to_string()),
                ));
            }
            None => {}
            Some(usher) => {
                if !self.trusted_witnesses.is_empty()
                    && !self.trusted_witnesses.contains(&canonical_fingerprint(&usher.fingerprint)?)
                {
                    return Err(security(
                        record,
                        LedgerError::SignatureInvalid(format!(
                            "witness {} is not trusted",
                            usher.fingerprint
                        )),
                    ));
                }
                if let Some(received_by) = &record.received_by {
                    if received_by != &usher.fingerprint {
                        return Err(LedgerError::MalformedRecord(format!(
                            "received_by {} does not match usher {}",
                            received_by, usher.fingerprint
                        )));
                    }
                }
            }
        }

        if !SignatureEngine::verify_all(record)? {
            return Err(security(
                record,
                LedgerError::SignatureInvalid("co-signature does not verify".to_string()),
            ));
        }
        Ok(())
    }

    /// Whether the owner key may append this record
    ///
    /// `views` are consulted in order. A no-op unless authorization is
    /// enforced.
    pub async fn authorize(&self, record: &Record, views: &[&LedgerState]) -> LedgerResult<()> {
        if self.authorization == AuthorizationMode::Off {
            return Ok(());
        }
        let owner = record
            .owner_fingerprint()
            .ok_or_else(|| LedgerError::SignerNotFound(SignerRole::Owner.to_string()))?;
        let owner = canonical_fingerprint(owner)?;
        let owner = owner.as_str();

        if record.is_genesis() {
            return authorize_genesis(record, owner, views).await;
        }

        let policy = effective_policy(&record.scope, views).await;
        if let Some(policy) = &policy {
            if !policy.accepts_record_type(&record.record_type) {
                return Err(security(
                    record,
                    LedgerError::Unauthorized(format!(
                        "record type '{}' is not accepted in scope '{}'",
                        record.record_type, record.scope
                    )),
                ));
            }
        }

        let at = record
            .at
            .as_deref()
            .and_then(|at| at.parse::<u64>().ok())
            .unwrap_or(0);
        let mut entries = Vec::new();
        for view in views {
            entries.extend(view.keyring().lineage_entries(&record.scope, owner).await);
        }
        entries.retain(|entry| entry.is_active(at));
        if entries.is_empty() {
            return Err(security(
                record,
                LedgerError::Unauthorized(format!(
                    "key {} is not registered for scope '{}'",
                    owner, record.scope
                )),
            ));
        }

        let allowed = policy
            .as_ref()
            .map(|p| p.roles_for(&record.record_type))
            .unwrap_or_default();
        if !allowed.is_empty()
            && !entries
                .iter()
                .any(|entry| allowed.iter().any(|role| entry.has_role(role)))
        {
            return Err(security(
                record,
                LedgerError::Unauthorized(format!(
                    "key {} lacks a role permitted for '{}'",
                    owner, record.record_type
                )),
            ));
        }
        Ok(())
    }
}

/// Genesis is self-trusting: the owner must be the key it installs, and a
/// declared child scope must be founded by one of its declared keys.
async fn authorize_genesis(record: &Record, owner: &str, views: &[&LedgerState]) -> LedgerResult<()> {
    let key = data_str(&record.data, KEY_FIELDS)
        .and_then(|k| canonical_fingerprint(k).ok())
        .unwrap_or_default();
    if key != owner {
        return Err(security(
            record,
            LedgerError::Unauthorized(format!(
                "genesis signed by {} but installs {}",
                owner, key
            )),
        ));
    }
    for view in views {
        if let Some(declaration) = view.declaration(&record.scope).await {
            if !declaration.keys.is_empty() && !declaration.keys.iter().any(|k| *k == key) {
                return Err(security(
                    record,
                    LedgerError::Unauthorized(format!(
                        "genesis key {} is not among the keys declared in '{}'",
                        key, declaration.declared_in
                    )),
                ));
            }
            break;
        }
    }
    Ok(())
}

async fn effective_policy(scope: &str, views: &[&LedgerState]) -> Option<TrustPolicy> {
    for s in scope_lineage(scope) {
        for view in views {
            if let Some(policy) = view.policy(s).await {
                return Some(policy);
            }
        }
    }
    None
}

fn security(record: &Record, err: LedgerError) -> LedgerError {
    warn!(
        target: targets::SECURITY,
        scope = %record.scope,
        record_type = %record.record_type,
        error = %err,
        "Record rejected"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::{KeyEntry, ProtocolVersion, ScopeDeclaration, DEFAULT_EPOCH_MS};
    use hl_signer::{LocalSigner, SigningOracle, UsherWitness};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn witness() -> UsherWitness {
        UsherWitness::with_epoch(Arc::new(LocalSigner::generate()), DEFAULT_EPOCH_MS)
    }

    fn sealed(owner: &LocalSigner, scope: &str, record_type: &str, data: Value) -> Record {
        let mut record = Record::new(ProtocolVersion::V1, scope, "n1", record_type, data);
        SignatureEngine::sign_role(&mut record, SignerRole::Owner, owner).unwrap();
        let tip = if record.is_genesis() { "" } else { "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=" };
        witness().witness(record, tip).unwrap()
    }

    #[test]
    fn test_seal_and_signatures() {
        let owner = LocalSigner::generate();
        let record = sealed(&owner, "self", "note:add", json!({"text": "hi"}));
        let verifier = RecordVerifier::default();

        assert!(verifier.seal(&record).is_ok());
        assert!(verifier.signatures(&record).is_ok());

        let mut tampered = record.clone();
        tampered.data = json!({"text": "bye"});
        assert!(matches!(
            verifier.seal(&tampered),
            Err(LedgerError::MalformedRecord(_))
        ));
        assert!(matches!(
            verifier.signatures(&tampered),
            Err(LedgerError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn test_usher_required_after_genesis() {
        let owner = LocalSigner::generate();
        let mut record = sealed(&owner, "self", "note:add", json!({}));
        record.signatures.retain(|s| s.role != SignerRole::Usher);

        let err = RecordVerifier::default().signatures(&record).unwrap_err();
        assert!(matches!(err, LedgerError::SignerNotFound(ref r) if r == "usher"));
    }

    #[test]
    fn test_untrusted_witness() {
        let owner = LocalSigner::generate();
        let record = sealed(&owner, "self", "note:add", json!({}));
        let verifier = RecordVerifier::new(AuthorizationMode::Off, vec!["someone-else".into()]);
        assert!(matches!(
            verifier.signatures(&record),
            Err(LedgerError::SignatureInvalid(_))
        ));
    }

    #[tokio::test]
    async fn test_authorize_off_accepts_anyone() {
        let owner = LocalSigner::generate();
        let record = sealed(&owner, "self", "note:add", json!({}));
        let state = LedgerState::new();
        assert!(RecordVerifier::default()
            .authorize(&record, &[&state])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_authorize_enforced_roles() {
        let owner = LocalSigner::generate();
        let verifier = RecordVerifier::new(AuthorizationMode::Enforce, vec![]);
        let state = LedgerState::new();
        let record = sealed(&owner, "self", "key:grant", json!({"key": "x"}));

        // unknown key
        assert!(matches!(
            verifier.authorize(&record, &[&state]).await,
            Err(LedgerError::Unauthorized(_))
        ));

        // registered in an ancestor, no policy
        state
            .keyring()
            .grant(KeyEntry::new("", owner.fingerprint(), ["writer"]))
            .await;
        assert!(verifier.authorize(&record, &[&state]).await.is_ok());

        // policy restricts grants to core
        state
            .set_policy(
                "self",
                TrustPolicy {
                    grant: vec!["core".into()],
                    ..Default::default()
                },
            )
            .await;
        assert!(verifier.authorize(&record, &[&state]).await.is_err());

        // a second view supplies the role
        let partition = LedgerState::new();
        partition
            .keyring()
            .grant(KeyEntry::new("self", owner.fingerprint(), ["core"]))
            .await;
        assert!(verifier
            .authorize(&record, &[&partition, &state])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_authorize_genesis() {
        let owner = LocalSigner::generate();
        let verifier = RecordVerifier::new(AuthorizationMode::Enforce, vec![]);
        let state = LedgerState::new();

        let own = sealed(&owner, "self", "genesis", json!({"key": owner.fingerprint()}));
        assert!(verifier.authorize(&own, &[&state]).await.is_ok());

        let other = sealed(&owner, "self", "genesis", json!({"key": "someone"}));
        assert!(verifier.authorize(&other, &[&state]).await.is_err());

        state
            .declare_scope(ScopeDeclaration {
                scope: "self".into(),
                description: None,
                created_by: "root".into(),
                declared_in: "".into(),
                declared_at: None,
                keys: vec!["reserved".into()],
            })
            .await;
        assert!(verifier.authorize(&own, &[&state]).await.is_err());
    }
}
