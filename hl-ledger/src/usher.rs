//! Usher submission endpoint
//!
//! Accepts raw JSON submissions, applies the cheap checks first (already
//! hashed, payload size) and answers with a numeric code: `200` and the witnessed
//! record on success, the error's code and message otherwise.

use std::sync::Arc;

use hl_core::{logging::truncate_payload, Record, RecordCodec, RecordStage, SignerRole};
use hl_signer::{SignatureEngine, UsherWitness};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::LedgerEngine;
use crate::error::{LedgerError, LedgerResult};

/// Success code
pub const CODE_OK: u16 = 200;

/// Answer to a submission
#[derive(Debug, Clone, Serialize)]
pub struct UsherResponse {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
}

impl UsherResponse {
    fn accepted(record: Record) -> Self {
        Self {
            code: CODE_OK,
            message: "accepted".to_string(),
            record: Some(record),
        }
    }

    fn rejected(err: &LedgerError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            record: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_OK
    }
}

/// Witnesses submissions and appends them through the engine
#[derive(Debug, Clone)]
pub struct UsherService {
    engine: Arc<LedgerEngine>,
    witness: UsherWitness,
    max_record_bytes: usize,
}

impl UsherService {
    pub fn new(engine: Arc<LedgerEngine>, witness: UsherWitness, max_record_bytes: usize) -> Self {
        Self {
            engine,
            witness,
            max_record_bytes,
        }
    }

    pub fn witness(&self) -> &UsherWitness {
        &self.witness
    }

    /// Handle one submission
    pub async fn submit(&self, submission: Value) -> UsherResponse {
        match self.process(submission).await {
            Ok(record) => UsherResponse::accepted(record),
            Err(e) => {
                warn!(code = e.code(), error = %e, "Submission rejected");
                UsherResponse::rejected(&e)
            }
        }
    }

    async fn process(&self, submission: Value) -> LedgerResult<Record> {
        let hashed = submission
            .get("current_hash")
            .map_or(false, |h| !h.is_null() && h.as_str() != Some(""));
        if hashed {
            return Err(LedgerError::AlreadyHashed);
        }

        let size = submission
            .get("data")
            .map_or(0, RecordCodec::canonical_size);
        if size > self.max_record_bytes {
            return Err(LedgerError::RecordTooLarge {
                size,
                max: self.max_record_bytes,
            });
        }
        debug!(size, payload = %truncate_payload(submission.to_string().as_bytes()), "Submission received");

        let record = RecordCodec::decode(&submission, RecordStage::Submission)?;
        if !SignatureEngine::verify_role(&record, &SignerRole::Owner)? {
            return Err(LedgerError::SignatureInvalid(
                "owner signature does not verify".to_string(),
            ));
        }

        let receipt = self.engine.submit(record, &self.witness).await?;
        info!(
            scope = %receipt.record.scope,
            record_type = %receipt.record.record_type,
            hash = %receipt.hash,
            "Submission accepted"
        );
        Ok(receipt.record)
    }
}
