//! Multi-signer composition and verification
//!
//! A record carries one `owner` signature over its signable payload and any
//! number of co-signer entries (`usher`, `quorum`, ...). Each co-signer signs
//! [`RecordCodec::cosign_bytes`] for its own position.

use hl_core::{Record, RecordCodec, SignatureEntry, SignerRole};
use tracing::debug;

use crate::crypto::verify_detached;
use crate::error::{SignerError, SignerResult};
use crate::oracle::SigningOracle;

/// Signature composition rules over records
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine;

impl SignatureEngine {
    /// Bytes the entry at `index` signs
    pub fn payload_for(record: &Record, index: usize) -> SignerResult<Vec<u8>> {
        let entry = record
            .signatures
            .get(index)
            .ok_or_else(|| SignerError::SignerNotFound(format!("position {}", index)))?;
        let payload = match entry.role {
            SignerRole::Owner => RecordCodec::signable_bytes(record)?,
            _ => RecordCodec::cosign_bytes(record, index)?,
        };
        Ok(payload)
    }

    /// Add (or replace) the signature of `oracle` in `role`
    ///
    /// - the owner signs first and exactly once; co-signers need an owner
    ///   entry to exist
    /// - a co-signer re-signing with the same role and fingerprint replaces
    ///   its entry in place (entries after it must then re-sign)
    pub fn sign_role(
        record: &mut Record,
        role: SignerRole,
        oracle: &dyn SigningOracle,
    ) -> SignerResult<()> {
        if record.is_sealed() {
            return Err(SignerError::AlreadyHashed);
        }
        let fingerprint = oracle.fingerprint();

        match (&role, record.owner_fingerprint()) {
            (SignerRole::Owner, Some(existing)) => {
                return Err(SignerError::OwnerAlreadySigned(existing.to_string()));
            }
            (SignerRole::Owner, None) => {}
            (_, None) => return Err(SignerError::OwnerSignatureRequired),
            _ => {}
        }

        let index = match record
            .signatures
            .iter()
            .position(|s| s.role == role && s.fingerprint == fingerprint)
        {
            Some(index) => {
                record.signatures[index].signature = None;
                index
            }
            None if role == SignerRole::Owner => {
                record
                    .signatures
                    .insert(0, SignatureEntry::unsigned(fingerprint, role.clone()));
                0
            }
            None => {
                record
                    .signatures
                    .push(SignatureEntry::unsigned(fingerprint, role.clone()));
                record.signatures.len() - 1
            }
        };

        let payload = Self::payload_for(record, index)?;
        let signature = oracle.sign(&payload)?;
        record.signatures[index].signature = Some(signature);

        debug!(
            role = %role,
            fingerprint = %fingerprint,
            record_type = %record.record_type,
            "Record signed"
        );
        Ok(())
    }

    /// Verify the first entry in `role`
    ///
    /// Fails with [`SignerError::SignerNotFound`] when no entry has the role.
    pub fn verify_role(record: &Record, role: &SignerRole) -> SignerResult<bool> {
        let index = record
            .signatures
            .iter()
            .position(|s| &s.role == role)
            .ok_or_else(|| SignerError::SignerNotFound(role.to_string()))?;
        Self::verify_entry(record, index)
    }

    /// Verify the entry at `index`
    pub fn verify_entry(record: &Record, index: usize) -> SignerResult<bool> {
        let payload = Self::payload_for(record, index)?;
        let entry = &record.signatures[index];
        match entry.signature.as_deref() {
            Some(signature) if !signature.is_empty() => {
                verify_detached(&payload, signature, &entry.fingerprint)
            }
            _ => Ok(false),
        }
    }

    /// Verify every entry on the record
    pub fn verify_all(record: &Record) -> SignerResult<bool> {
        for index in 0..record.signatures.len() {
            if !Self::verify_entry(record, index)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
