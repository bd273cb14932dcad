//! HL Ed25519 Cryptographic Primitives
//!
//! Detached Ed25519 signatures over canonical bytes. Public keys and
//! signatures travel as URL-safe base64 without padding; a key's
//! fingerprint is its encoded public key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;

use crate::error::{SignerError, SignerResult};

/// Encode bytes in the ledger's key/signature alphabet
pub fn encode_b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode the ledger's key/signature alphabet; trailing padding is tolerated
pub fn decode_b64(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(s.trim_end_matches('='))
}

/// HL Ed25519 key pair for signing
#[derive(Clone)]
pub struct HlSigningKey {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    fingerprint: String,
}

impl HlSigningKey {
    /// Generate a new random signing key
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Create from a 32-byte seed or a 64-byte seed‖public keypair
    pub fn from_bytes(bytes: &[u8]) -> SignerResult<Self> {
        match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(bytes);
                Ok(Self::from_seed(&seed))
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(bytes);
                let signing_key = SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SignerError::InvalidKey(format!("Keypair mismatch: {}", e)))?;
                Ok(Self::from_signing_key(signing_key))
            }
            n => Err(SignerError::InvalidKey(format!(
                "Invalid private key length: expected 32 or 64, got {}",
                n
            ))),
        }
    }

    /// Create from an encoded seed or keypair
    pub fn from_base64(s: &str) -> SignerResult<Self> {
        let bytes =
            decode_b64(s).map_err(|e| SignerError::InvalidKey(format!("Invalid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        let fingerprint = encode_b64(verifying_key.as_bytes());
        Self {
            signing_key,
            verifying_key,
            fingerprint,
        }
    }

    /// Encoded public key
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Encoded 32-byte seed
    pub fn seed_base64(&self) -> String {
        encode_b64(&self.signing_key.to_bytes())
    }

    /// Get the HlVerifyingKey for this signing key
    pub fn verifying_key(&self) -> HlVerifyingKey {
        HlVerifyingKey {
            verifying_key: self.verifying_key,
            fingerprint: self.fingerprint.clone(),
        }
    }

    /// Sign a payload, returning the encoded signature
    pub fn sign(&self, payload: &[u8]) -> String {
        encode_b64(&self.signing_key.sign(payload).to_bytes())
    }
}

impl std::fmt::Debug for HlSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HlSigningKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// HL Ed25519 public key for verification
#[derive(Clone, Debug)]
pub struct HlVerifyingKey {
    verifying_key: VerifyingKey,
    fingerprint: String,
}

impl HlVerifyingKey {
    /// Create from an encoded public key
    ///
    /// The fingerprint is always the unpadded re-encoding, whatever form
    /// the input took.
    pub fn from_base64(fingerprint: &str) -> SignerResult<Self> {
        let bytes = decode_b64(fingerprint)
            .map_err(|e| SignerError::InvalidKey(format!("Invalid base64: {}", e)))?;
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey(format!(
                "Invalid public key length: expected 32, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        let verifying_key = VerifyingKey::from_bytes(&arr)
            .map_err(|e| SignerError::InvalidKey(format!("Invalid public key: {}", e)))?;
        Ok(Self {
            verifying_key,
            fingerprint: encode_b64(verifying_key.as_bytes()),
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Verify an encoded signature
    ///
    /// A signature that does not decode or has the wrong length is simply
    /// invalid.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(bytes) = decode_b64(signature) else {
            return false;
        };
        let Ok(arr) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key
            .verify(payload, &Signature::from_bytes(&arr))
            .is_ok()
    }
}

/// The single fingerprint form of an encoded public key
pub fn canonical_fingerprint(public_key: &str) -> SignerResult<String> {
    Ok(HlVerifyingKey::from_base64(public_key)?.fingerprint)
}

/// Sign a payload with an encoded private key
pub fn sign_detached(payload: &[u8], private_key: &str) -> SignerResult<String> {
    Ok(HlSigningKey::from_base64(private_key)?.sign(payload))
}

/// Verify a detached signature
///
/// Returns `Ok(false)` for a bad signature and `Err` only when the public key
/// itself is structurally invalid.
pub fn verify_detached(payload: &[u8], signature: &str, public_key: &str) -> SignerResult<bool> {
    Ok(HlVerifyingKey::from_base64(public_key)?.verify(payload, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = HlSigningKey::generate();
        let message = b"test message";

        let signature = key.sign(message);
        assert!(verify_detached(message, &signature, key.fingerprint()).unwrap());
        assert!(!verify_detached(b"other message", &signature, key.fingerprint()).unwrap());
    }

    #[test]
    fn test_deterministic() {
        let key = HlSigningKey::from_seed(&[7u8; 32]);
        assert_eq!(key.sign(b"payload"), key.sign(b"payload"));
    }

    #[test]
    fn test_single_byte_flips_fail() {
        let key = HlSigningKey::generate();
        let payload = b"{\"data\":{},\"nonce\":\"n\"}".to_vec();
        let signature = key.sign(&payload);
        let verifying = key.verifying_key();

        for i in 0..payload.len() {
            let mut tampered = payload.clone();
            tampered[i] ^= 0x01;
            assert!(!verifying.verify(&tampered, &signature));
        }

        let mut sig_bytes = decode_b64(&signature).unwrap();
        sig_bytes[10] ^= 0x01;
        assert!(!verifying.verify(&payload, &encode_b64(&sig_bytes)));
    }

    #[test]
    fn test_malformed_signature_is_false() {
        let key = HlSigningKey::generate();
        assert!(!verify_detached(b"m", "not-a-signature", key.fingerprint()).unwrap());
        assert!(!verify_detached(b"m", "", key.fingerprint()).unwrap());
    }

    #[test]
    fn test_wrong_length_key_is_error() {
        let key = HlSigningKey::generate();
        let signature = key.sign(b"m");
        let short_key = encode_b64(&[1u8; 16]);
        assert!(matches!(
            verify_detached(b"m", &signature, &short_key),
            Err(SignerError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_seed_and_keypair_forms() {
        let key = HlSigningKey::generate();
        let from_seed = HlSigningKey::from_base64(&key.seed_base64()).unwrap();
        assert_eq!(from_seed.fingerprint(), key.fingerprint());

        let mut keypair = decode_b64(&key.seed_base64()).unwrap();
        keypair.extend_from_slice(&decode_b64(key.fingerprint()).unwrap());
        let from_keypair = HlSigningKey::from_bytes(&keypair).unwrap();
        assert_eq!(from_keypair.fingerprint(), key.fingerprint());

        // mismatched public half
        keypair[40] ^= 0xff;
        assert!(HlSigningKey::from_bytes(&keypair).is_err());

        let signature = sign_detached(b"m", &key.seed_base64()).unwrap();
        assert!(verify_detached(b"m", &signature, key.fingerprint()).unwrap());
    }

    #[test]
    fn test_padding_tolerated() {
        let key = HlSigningKey::generate();
        let padded = format!("{}=", key.fingerprint());
        let verifying = HlVerifyingKey::from_base64(&padded).unwrap();
        assert_eq!(verifying.fingerprint(), key.fingerprint());
        assert_eq!(canonical_fingerprint(&padded).unwrap(), key.fingerprint());
        assert_eq!(canonical_fingerprint(key.fingerprint()).unwrap(), key.fingerprint());
        assert!(canonical_fingerprint("not a key").is_err());
    }
}
