//! HL Ledger - HodeauxLedger engine
//!
//! Ties the record model, signer and store together:
//! - [`LedgerEngine`]: per-scope serialized append pipeline
//! - [`RecordProcessor`]: trust record handlers (keys, policies, scopes)
//! - [`BootstrapRebuilder`]: derived state from the stored chains
//! - [`UsherService`]: submission endpoint with numeric response codes
//!
//! [`open`] wires a file-backed ledger from a [`LedgerConfig`].

pub mod config;
pub mod engine;
pub mod error;
pub mod keyring;
pub mod processor;
pub mod rebuild;
pub mod state;
pub mod telemetry;
pub mod usher;
pub mod verify;

pub use config::{AuthorizationMode, HandlerErrorPolicy, LedgerConfig};
pub use engine::{CommitReceipt, EngineSettings, LedgerEngine};
pub use error::{LedgerError, LedgerResult};
pub use keyring::KeyRegistry;
pub use processor::{Effect, Outcome, RecordProcessor};
pub use rebuild::{BootstrapRebuilder, RebuildReport, ScopeReport};
pub use state::{LedgerState, StateSnapshot};
pub use telemetry::{init_logging, LogConfig, LogFormat};
pub use usher::{UsherResponse, UsherService, CODE_OK};
pub use verify::RecordVerifier;

use std::sync::Arc;

use hl_signer::{SigningOracle, UsherWitness};
use hl_store::{ChainStore, FileBlobStore, MemoryRecordCache};
use tracing::info;

/// An opened ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    pub engine: Arc<LedgerEngine>,
    pub usher: UsherService,
    pub rebuilder: BootstrapRebuilder,
}

/// Open the file-backed ledger under `config.data_dir`
///
/// Every stored chain is re-verified and replayed before this returns; a
/// corrupt chain fails the open.
pub async fn open(
    config: &LedgerConfig,
    witness_key: Arc<dyn SigningOracle>,
) -> LedgerResult<(Ledger, RebuildReport)> {
    config.validate()?;
    let blobs = FileBlobStore::new(&config.data_dir).await?;
    let chains = ChainStore::new(Arc::new(blobs));
    let engine = Arc::new(LedgerEngine::new(
        chains,
        Arc::new(MemoryRecordCache::new()),
        EngineSettings::from(config),
    ));

    let rebuilder = BootstrapRebuilder::new(Arc::clone(&engine));
    let report = rebuilder.rebuild_all().await?;

    let witness = UsherWitness::with_epoch(witness_key, config.epoch_ms);
    info!(
        data_dir = %config.data_dir.display(),
        witness = %witness.fingerprint(),
        records = report.total_records(),
        "Ledger opened"
    );
    let usher = UsherService::new(Arc::clone(&engine), witness, config.max_record_bytes);

    Ok((
        Ledger {
            engine,
            usher,
            rebuilder,
        },
        report,
    ))
}
