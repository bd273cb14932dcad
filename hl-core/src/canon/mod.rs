//! Canonicalization module
//!
//! Every signer and verifier in the ledger agrees on bytes through this
//! module and nowhere else.

mod json;

pub use json::*;
