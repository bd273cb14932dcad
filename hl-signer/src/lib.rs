//! HL Signer - signatures and witnessing
//!
//! - Ed25519 keys, detached signatures and the ledger's base64 alphabet
//! - [`SigningOracle`] for key custody, [`LocalSigner`] in process
//! - [`SignatureEngine`]: owner + co-signer composition rules
//! - [`UsherWitness`]: timestamps, witness signature and sealing

pub mod crypto;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod witness;

pub use crypto::*;
pub use engine::*;
pub use error::*;
pub use oracle::*;
pub use witness::*;
