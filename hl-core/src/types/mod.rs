//! Core type definitions for the HodeauxLedger
//!
//! Naming conventions:
//! - snake_case for field names, matching the wire format
//! - `*_hash` for base64 SHA-256 digests
//! - `*_at` for micromark timestamps rendered as decimal strings

mod hash;
mod key_entry;
mod policy;
mod protocol;
mod record;
mod record_type;
mod scope;
mod signature;
mod time;

pub use hash::*;
pub use key_entry::*;
pub use policy::*;
pub use protocol::*;
pub use record::*;
pub use record_type::*;
pub use scope::*;
pub use signature::*;
pub use time::*;
