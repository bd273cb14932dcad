//! Ledger engine
//!
//! Appends run under a per-scope async mutex through these stages:
//!
//! 1. Validating: structure and recomputed `current_hash`
//! 2. TipChecking: genesis needs an empty scope, anything else must attach
//!    to the current tip
//! 3. Verifying: signatures, then authorization when enforced
//! 4. Processing: the handler plans its effect without touching state
//! 5. Persisting: blob first, tip second; the blob is withdrawn if the tip
//!    cannot be moved
//! 6. Committed: the planned effect is applied and the cache mirrored
//!
//! A failure at any stage rejects the record and leaves no trace: the tip
//! only moves once the blob is written and derived state only changes after
//! that.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex};

use hl_core::{Record, RecordHash};
use hl_signer::UsherWitness;
use hl_store::{ChainStore, RecordCache};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::{AuthorizationMode, HandlerErrorPolicy, LedgerConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::processor::{Outcome, RecordProcessor};
use crate::state::LedgerState;
use crate::verify::RecordVerifier;

/// Engine behaviour switches
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub handler_errors: HandlerErrorPolicy,
    pub authorization: AuthorizationMode,
    pub trusted_witnesses: Vec<String>,
}

impl From<&LedgerConfig> for EngineSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            handler_errors: config.handler_errors,
            authorization: config.authorization,
            trusted_witnesses: config.trusted_witnesses.clone(),
        }
    }
}

impl EngineSettings {
    pub fn verifier(&self) -> RecordVerifier {
        RecordVerifier::new(self.authorization, self.trusted_witnesses.clone())
    }
}

/// Result of a committed append
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// The record as stored
    pub record: Record,
    pub hash: RecordHash,
    /// `None` when the handler failed and the failure was only logged
    pub outcome: Option<Outcome>,
}

type LockTable = HashMap<String, Arc<Mutex<()>>>;

/// One async mutex per scope, dropped from the table once nobody holds or
/// waits for it
#[derive(Debug, Default)]
pub(crate) struct ScopeLocks {
    locks: Arc<SyncMutex<LockTable>>,
}

impl ScopeLocks {
    pub(crate) async fn acquire(&self, scope: &str) -> ScopeGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(scope.to_string()).or_default().clone()
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        ScopeGuard {
            scope: scope.to_string(),
            lock,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Scopes with a live lock entry
    pub(crate) fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Held scope lock
pub(crate) struct ScopeGuard {
    scope: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<SyncMutex<LockTable>>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        // the table and this guard are the only owners left
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.scope);
        }
    }
}

/// The ledger engine
pub struct LedgerEngine {
    chains: ChainStore,
    cache: Arc<dyn RecordCache>,
    state: Arc<LedgerState>,
    locks: ScopeLocks,
    settings: EngineSettings,
    verifier: RecordVerifier,
}

impl LedgerEngine {
    pub fn new(chains: ChainStore, cache: Arc<dyn RecordCache>, settings: EngineSettings) -> Self {
        let verifier = settings.verifier();
        Self {
            chains,
            cache,
            state: Arc::new(LedgerState::new()),
            locks: ScopeLocks::default(),
            settings,
            verifier,
        }
    }

    pub fn chains(&self) -> &ChainStore {
        &self.chains
    }

    pub fn cache(&self) -> &Arc<dyn RecordCache> {
        &self.cache
    }

    pub fn state(&self) -> &Arc<LedgerState> {
        &self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub(crate) fn verifier(&self) -> &RecordVerifier {
        &self.verifier
    }

    pub(crate) async fn lock_scope(&self, scope: &str) -> ScopeGuard {
        self.locks.acquire(scope).await
    }

    /// Current tip of a scope
    pub async fn tip(&self, scope: &str) -> LedgerResult<Option<RecordHash>> {
        Ok(self.chains.tip(scope).await?)
    }

    /// Records of a scope whose type starts with `type_prefix`, from the cache
    pub async fn query(&self, scope: &str, type_prefix: &str) -> LedgerResult<Vec<Record>> {
        Ok(self.cache.query(scope, type_prefix).await?)
    }

    /// Replace all derived state with a rebuilt one
    pub async fn install(&self, state: LedgerState) {
        self.state.clear().await;
        self.state.absorb(state).await;
    }

    /// Append an already witnessed and sealed record
    pub async fn append(&self, record: Record) -> LedgerResult<CommitReceipt> {
        let _guard = self.lock_scope(&record.scope).await;
        debug!(scope = %record.scope, "Scope lock acquired");
        self.append_locked(record).await
    }

    /// Witness an owner-signed submission and append it
    ///
    /// The scope lock is held from reading the tip through persisting, so
    /// the witness always attaches to the tip the append will check.
    pub async fn submit(&self, record: Record, witness: &UsherWitness) -> LedgerResult<CommitReceipt> {
        let _guard = self.lock_scope(&record.scope).await;

        let tip = self.chains.tip(&record.scope).await?;
        check_attachment(&record.scope, record.is_genesis(), tip.as_ref())?;
        let tip = tip.map(|h| h.to_base64()).unwrap_or_default();

        let witnessed = witness.witness(record, &tip)?;
        self.append_locked(witnessed).await
    }

    async fn append_locked(&self, record: Record) -> LedgerResult<CommitReceipt> {
        // Validating
        let hash = self.verifier.seal(&record)?;

        // TipChecking
        let tip = self.chains.tip(&record.scope).await?;
        check_attachment(&record.scope, record.is_genesis(), tip.as_ref())?;
        if let Some(tip) = tip {
            let expected = tip.to_base64();
            if record.previous_hash_str() != expected {
                return Err(LedgerError::PreviousHashMismatch {
                    expected,
                    actual: record.previous_hash_str().to_string(),
                });
            }
        }

        // Verifying
        self.verifier.signatures(&record)?;
        self.verifier.authorize(&record, &[&*self.state]).await?;

        // Processing (plan only)
        let effect = match RecordProcessor::plan(&self.state, &record).await {
            Ok(effect) => Some(effect),
            Err(e) => match self.settings.handler_errors {
                HandlerErrorPolicy::Reject => {
                    warn!(scope = %record.scope, record_type = %record.record_type, error = %e, "Handler refused record");
                    return Err(e);
                }
                HandlerErrorPolicy::Log => {
                    warn!(scope = %record.scope, record_type = %record.record_type, error = %e, "Handler failed, committing without effect");
                    None
                }
            },
        };

        // Persisting
        self.chains.append(&record).await.map_err(|e| {
            tracing::error!(scope = %record.scope, hash = %hash, error = %e, "Failed to persist record");
            LedgerError::from(e)
        })?;

        // Committed
        let outcome = match effect {
            Some(effect) => Some(RecordProcessor::apply(&self.state, effect).await),
            None => None,
        };
        if let Err(e) = self.cache.insert(&record).await {
            warn!(scope = %record.scope, hash = %hash, error = %e, "Cache insert failed");
        }

        info!(
            scope = %record.scope,
            record_type = %record.record_type,
            hash = %hash,
            "Record committed"
        );
        Ok(CommitReceipt {
            record,
            hash,
            outcome,
        })
    }
}

impl std::fmt::Debug for LedgerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Genesis needs an empty scope; anything else needs an existing one
fn check_attachment(scope: &str, genesis: bool, tip: Option<&RecordHash>) -> LedgerResult<()> {
    match (genesis, tip) {
        (true, Some(_)) => Err(LedgerError::ScopeAlreadyExists(scope.to_string())),
        (false, None) => Err(LedgerError::ScopeNotFound(scope.to_string())),
        _ => Ok(()),
    }
}
