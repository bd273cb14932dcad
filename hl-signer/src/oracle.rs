//! Signing oracles
//!
//! The ledger never touches private key material directly; it asks an oracle
//! to sign canonical bytes. Key custody (files, HSMs, encryption at rest)
//! lives behind this trait.

use crate::crypto::HlSigningKey;
use crate::error::SignerResult;

/// Something that can sign on behalf of one key
pub trait SigningOracle: Send + Sync {
    /// Encoded public key of the signing identity
    fn fingerprint(&self) -> &str;

    /// Sign a payload, returning the encoded detached signature
    fn sign(&self, payload: &[u8]) -> SignerResult<String>;
}

/// In-process oracle holding the key in memory
#[derive(Debug, Clone)]
pub struct LocalSigner {
    key: HlSigningKey,
}

impl LocalSigner {
    pub fn new(key: HlSigningKey) -> Self {
        Self { key }
    }

    /// Oracle over a freshly generated key
    pub fn generate() -> Self {
        Self::new(HlSigningKey::generate())
    }

    pub fn key(&self) -> &HlSigningKey {
        &self.key
    }
}

impl SigningOracle for LocalSigner {
    fn fingerprint(&self) -> &str {
        self.key.fingerprint()
    }

    fn sign(&self, payload: &[u8]) -> SignerResult<String> {
        Ok(self.key.sign(payload))
    }
}
