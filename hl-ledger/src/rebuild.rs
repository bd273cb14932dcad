//! Bootstrap rebuild
//!
//! Disk is the only source of truth. The rebuilder walks every stored chain
//! from genesis, re-verifies each record against the state known at that
//! point, replays processing, repairs stale tip pointers and finally
//! installs the derived state into the engine.
//!
//! Rebuilding runs in two passes. Chain structure, seals and signatures only
//! depend on the chain itself, so every scope is checked concurrently.
//! Authorization and processing depend on inherited keys and policies, so
//! the records of all chains are then replayed into one state in the order
//! the witness accepted them (`at`), each chain keeping its own order. A
//! record is thereby judged against its ancestors as they stood when it was
//! appended, not as they stand at the end of their chains.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hl_core::{scope_lineage, Record, RecordHash, ROOT_SCOPE, SCOPE_SEPARATOR};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::HandlerErrorPolicy;
use crate::engine::LedgerEngine;
use crate::error::{LedgerError, LedgerResult};
use crate::processor::RecordProcessor;
use crate::state::LedgerState;

/// Rebuild result for one scope
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: String,
    pub records: usize,
    /// Hash of the last record, `None` for an empty scope
    pub tip: Option<String>,
    /// The stored tip pointer was missing or stale and has been rewritten
    pub tip_repaired: bool,
    /// Records whose handler failed and were kept without effect
    pub handler_failures: usize,
}

/// Rebuild result for the whole ledger
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub scopes: Vec<ScopeReport>,
}

impl RebuildReport {
    pub fn total_records(&self) -> usize {
        self.scopes.iter().map(|s| s.records).sum()
    }
}

/// Rebuilds derived state from the stored chains
#[derive(Debug, Clone)]
pub struct BootstrapRebuilder {
    engine: Arc<LedgerEngine>,
}

/// A stored chain whose linkage, seals and signatures have been checked
#[derive(Debug)]
struct VerifiedChain {
    scope: String,
    records: Vec<(Record, RecordHash)>,
    stored_tip: Option<RecordHash>,
}

impl VerifiedChain {
    fn last(&self) -> Option<RecordHash> {
        self.records.last().map(|(_, hash)| *hash)
    }
}

impl BootstrapRebuilder {
    pub fn new(engine: Arc<LedgerEngine>) -> Self {
        Self { engine }
    }

    /// Re-verify and replay a single scope, replacing its derived state
    ///
    /// The scope's ancestors are replayed alongside it so inherited keys and
    /// policies are consulted as they stood at each record; only the
    /// scope's own state is swapped into the engine.
    pub async fn rebuild(&self, scope: &str) -> LedgerResult<ScopeReport> {
        let _guard = self.engine.lock_scope(scope).await;

        let mut chains = Vec::new();
        for s in scope_lineage(scope).into_iter().rev() {
            chains.push(self.verify_chain(s).await?);
        }
        let scratch = LedgerState::new();
        let failures = self.replay(&chains, &scratch).await?;

        let Some(own) = chains.last() else {
            return Err(LedgerError::Internal(format!("no chain loaded for scope '{}'", scope)));
        };
        let report = self
            .settle(own, failures.get(scope).copied().unwrap_or_default())
            .await?;
        self.engine
            .state()
            .replace_scope(scope, scratch.scope_partition(scope).await)
            .await;
        Ok(report)
    }

    /// Re-verify and replay every stored scope, then install the result
    pub async fn rebuild_all(&self) -> LedgerResult<RebuildReport> {
        let started_at = Utc::now();
        let started = Instant::now();

        self.engine.cache().flush().await?;

        let mut tasks = JoinSet::new();
        for scope in self.engine.chains().list_scopes().await? {
            let rebuilder = self.clone();
            tasks.spawn(async move { rebuilder.verify_chain(&scope).await });
        }
        let mut chains = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let chain = joined
                .map_err(|e| LedgerError::Internal(format!("rebuild task failed: {}", e)))??;
            chains.push(chain);
        }
        chains.sort_by(|a, b| a.scope.cmp(&b.scope));
        info!(scopes = chains.len(), "Chains verified");

        let state = LedgerState::new();
        let failures = self.replay(&chains, &state).await?;

        let mut reports = Vec::with_capacity(chains.len());
        for chain in &chains {
            let handler_failures = failures.get(&chain.scope).copied().unwrap_or_default();
            reports.push(self.settle(chain, handler_failures).await?);
        }
        self.engine.install(state).await;

        let report = RebuildReport {
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            scopes: reports,
        };
        info!(
            scopes = report.scopes.len(),
            records = report.total_records(),
            duration_ms = report.duration_ms,
            "Ledger rebuilt"
        );
        Ok(report)
    }

    /// Walk one chain checking position, linkage, seal and signatures
    async fn verify_chain(&self, scope: &str) -> LedgerResult<VerifiedChain> {
        let chains = self.engine.chains();
        let verifier = self.engine.verifier();

        let mut walk = chains.walk(scope);
        let mut records: Vec<(Record, RecordHash)> = Vec::new();
        loop {
            let index = walk.index();
            let record = match walk.next().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) => return Err(fail(scope, index, e.to_string())),
            };

            if record.is_genesis() != (index == 0) {
                let reason = if index == 0 {
                    "chain does not start with genesis"
                } else {
                    "genesis out of position"
                };
                return Err(fail(scope, index, reason));
            }
            let expected = records
                .last()
                .map(|(_, h)| h.to_base64())
                .unwrap_or_default();
            if record.previous_hash_str() != expected {
                return Err(fail(
                    scope,
                    index,
                    format!("previous_hash {} does not link to {}", record.previous_hash_str(), expected),
                ));
            }
            let hash = verifier
                .seal(&record)
                .map_err(|e| fail(scope, index, e.to_string()))?;
            verifier
                .signatures(&record)
                .map_err(|e| fail(scope, index, e.to_string()))?;
            records.push((record, hash));
        }

        let stored_tip = chains.tip(scope).await?;
        if records.is_empty() {
            if let Some(stored) = stored_tip {
                return Err(fail(scope, 0, format!("tip {} points past an empty chain", stored)));
            }
        }
        debug!(scope = %scope, records = records.len(), "Chain verified");
        Ok(VerifiedChain {
            scope: scope.to_string(),
            records,
            stored_tip,
        })
    }

    /// Authorize and process verified chains in acceptance order
    ///
    /// Returns the number of handler failures per scope.
    async fn replay(&self, chains: &[VerifiedChain], state: &LedgerState) -> LedgerResult<BTreeMap<String, usize>> {
        let verifier = self.engine.verifier();
        let handler_errors = self.engine.settings().handler_errors;
        let mut failures = BTreeMap::new();

        let mut next = vec![0usize; chains.len()];
        let mut heads = BinaryHeap::new();
        for (i, chain) in chains.iter().enumerate() {
            if let Some((record, _)) = chain.records.first() {
                heads.push(Reverse(replay_order(record, i)));
            }
        }

        while let Some(Reverse((_, _, i))) = heads.pop() {
            let chain = &chains[i];
            let index = next[i];
            let (record, hash) = &chain.records[index];
            next[i] += 1;
            if let Some((following, _)) = chain.records.get(index + 1) {
                heads.push(Reverse(replay_order(following, i)));
            }

            verifier
                .authorize(record, &[state])
                .await
                .map_err(|e| fail(&chain.scope, index, e.to_string()))?;

            match RecordProcessor::plan(state, record).await {
                Ok(effect) => {
                    RecordProcessor::apply(state, effect).await;
                }
                Err(e) if handler_errors == HandlerErrorPolicy::Reject => {
                    return Err(fail(&chain.scope, index, e.to_string()));
                }
                Err(e) => {
                    warn!(scope = %chain.scope, index, error = %e, "Handler failed during replay");
                    *failures.entry(chain.scope.clone()).or_default() += 1;
                }
            }

            if let Err(e) = self.engine.cache().insert(record).await {
                warn!(scope = %chain.scope, hash = %hash, error = %e, "Cache insert failed");
            }
        }
        Ok(failures)
    }

    /// Repair a missing or stale tip pointer and report on the scope
    async fn settle(&self, chain: &VerifiedChain, handler_failures: usize) -> LedgerResult<ScopeReport> {
        let last = chain.last();
        let mut tip_repaired = false;
        if let Some(last) = last {
            if chain.stored_tip != Some(last) {
                warn!(
                    scope = %chain.scope,
                    stored = ?chain.stored_tip,
                    tip = %last,
                    "Tip pointer missing or stale, repairing"
                );
                self.engine.chains().repair_tip(&chain.scope, &last).await?;
                tip_repaired = true;
            }
        }

        let report = ScopeReport {
            scope: chain.scope.clone(),
            records: chain.records.len(),
            tip: last.map(|h| h.to_base64()),
            tip_repaired,
            handler_failures,
        };
        info!(scope = %report.scope, records = report.records, "Scope rebuilt");
        Ok(report)
    }
}

/// Heap key: witness time, then shallower scopes first
fn replay_order(record: &Record, chain: usize) -> (u64, usize, usize) {
    let at = record
        .at
        .as_deref()
        .and_then(|at| at.parse::<u64>().ok())
        .unwrap_or_default();
    (at, scope_depth(&record.scope), chain)
}

fn scope_depth(scope: &str) -> usize {
    if scope == ROOT_SCOPE {
        0
    } else {
        scope.matches(SCOPE_SEPARATOR).count() + 1
    }
}

fn fail(scope: &str, index: usize, reason: impl Into<String>) -> LedgerError {
    let err = LedgerError::chain(scope, index, reason);
    error!(scope = %scope, index, error = %err, "Chain verification failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::ProtocolVersion;
    use serde_json::json;

    #[test]
    fn test_scope_depth() {
        assert_eq!(scope_depth(""), 0);
        assert_eq!(scope_depth("self"), 1);
        assert_eq!(scope_depth("self.a.b"), 3);
    }

    #[test]
    fn test_replay_order() {
        let stamped = |scope: &str, at: Option<&str>| {
            let mut record = Record::new(ProtocolVersion::V1, scope, "n", "note:add", json!({}));
            record.at = at.map(str::to_string);
            record
        };

        let mut heap = BinaryHeap::new();
        heap.push(Reverse(replay_order(&stamped("self", Some("7")), 0)));
        heap.push(Reverse(replay_order(&stamped("", Some("7")), 1)));
        heap.push(Reverse(replay_order(&stamped("self.a", Some("3")), 2)));
        heap.push(Reverse(replay_order(&stamped("", None), 3)));

        let order: Vec<usize> = std::iter::from_fn(|| heap.pop().map(|Reverse((_, _, i))| i)).collect();
        assert_eq!(order, vec![3, 2, 1, 0]);
    }
}
