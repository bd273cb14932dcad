//! Usher witness
//!
//! The ledger's own signing identity. Witnessing assigns the attachment
//! point, stamps `at` and `received_by`, appends the `usher` signature and
//! seals the record with `current_hash`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use hl_core::{unix_ms_to_micromarks, Record, RecordCodec, SignerRole, GENESIS_AT, ROOT_SCOPE};
use tracing::{debug, warn};

use crate::engine::SignatureEngine;
use crate::error::{SignerError, SignerResult};
use crate::oracle::SigningOracle;

/// Source of witness timestamps in micromarks
pub trait Clock: Send + Sync {
    fn now_micromarks(&self) -> u64;
}

/// Wall clock relative to a ledger epoch, strictly increasing across calls
#[derive(Debug)]
pub struct SystemClock {
    epoch_ms: i64,
    last: AtomicU64,
}

impl SystemClock {
    pub fn new(epoch_ms: i64) -> Self {
        Self {
            epoch_ms,
            last: AtomicU64::new(0),
        }
    }
}

impl Clock for SystemClock {
    fn now_micromarks(&self) -> u64 {
        let wall = unix_ms_to_micromarks(Utc::now().timestamp_millis(), self.epoch_ms)
            .min(u64::MAX as u128) as u64;
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// The usher's witnessing identity
#[derive(Clone)]
pub struct UsherWitness {
    oracle: Arc<dyn SigningOracle>,
    clock: Arc<dyn Clock>,
}

impl UsherWitness {
    pub fn new(oracle: Arc<dyn SigningOracle>, clock: Arc<dyn Clock>) -> Self {
        Self { oracle, clock }
    }

    /// Witness with a [`SystemClock`] at the given epoch
    pub fn with_epoch(oracle: Arc<dyn SigningOracle>, epoch_ms: i64) -> Self {
        Self::new(oracle, Arc::new(SystemClock::new(epoch_ms)))
    }

    pub fn fingerprint(&self) -> &str {
        self.oracle.fingerprint()
    }

    /// Witness an owner-signed record attaching after `tip`
    ///
    /// `tip` is the current tip hash of the record's scope, `""` when the
    /// scope has no records yet. Client-chained protocols must already name
    /// that tip in `previous_hash`; otherwise the witness assigns it.
    pub fn witness(&self, mut record: Record, tip: &str) -> SignerResult<Record> {
        if record.is_sealed() {
            warn!(scope = %record.scope, "Refusing to witness a record that already carries current_hash");
            return Err(SignerError::AlreadyHashed);
        }
        if record.owner_fingerprint().is_none() {
            return Err(SignerError::OwnerSignatureRequired);
        }

        let protocol = record.protocol_version()?;
        if protocol.client_chained() {
            let claimed = record.previous_hash_str();
            if claimed != tip {
                return Err(SignerError::PreviousHashMismatch {
                    expected: tip.to_string(),
                    actual: claimed.to_string(),
                });
            }
        }
        record.previous_hash = Some(tip.to_string());

        let at = if record.is_genesis() && record.scope == ROOT_SCOPE {
            GENESIS_AT.to_string()
        } else {
            self.clock.now_micromarks().to_string()
        };
        record.at = Some(at);
        record.received_by = Some(self.fingerprint().to_string());

        record.signatures.retain(|s| s.role != SignerRole::Usher);
        SignatureEngine::sign_role(&mut record, SignerRole::Usher, self.oracle.as_ref())?;

        let hash = RecordCodec::hash(&record)?;
        record.current_hash = Some(hash.to_base64());

        debug!(
            scope = %record.scope,
            record_type = %record.record_type,
            hash = %hash,
            "Record witnessed"
        );
        Ok(record)
    }

    /// Verify that this witness sealed the record
    pub fn verify_witness(&self, record: &Record) -> SignerResult<bool> {
        let entry = record
            .signature_for(&SignerRole::Usher)
            .ok_or_else(|| SignerError::SignerNotFound(SignerRole::Usher.to_string()))?;
        if entry.fingerprint != self.fingerprint() {
            return Ok(false);
        }
        SignatureEngine::verify_role(record, &SignerRole::Usher)
    }
}

impl std::fmt::Debug for UsherWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsherWitness")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}
