//! HL Core - HodeauxLedger record model
//!
//! Types and pure functions shared by every HodeauxLedger crate:
//! - Canonical JSON serialization
//! - Records, signature entries and protocol versions
//! - Content hashing and structural validation ([`RecordCodec`])
//! - Key entries, trust policies and scope naming
//! - Ledger time (micromarks and [`GeoTime`])
//!
//! Nothing here performs I/O or holds state.

pub mod canon;
pub mod codec;
pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

pub use canon::{canonicalize, canonicalize_to_string, Canonicalizer, JsonCanonicalizer};
pub use codec::{RecordCodec, RecordStage};
pub use constants::*;
pub use error::*;
pub use types::*;
