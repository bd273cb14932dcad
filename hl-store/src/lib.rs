//! HL Store - HodeauxLedger persistence
//!
//! - [`BlobStore`]: write-once record blobs and tip pointers (file, memory)
//! - [`ChainStore`]: append, tip tracking and genesis-to-tip traversal
//! - [`RecordCache`]: rebuildable queryable mirror

pub mod blob;
pub mod cache;
pub mod chain;
pub mod error;
pub mod keys;

pub use blob::*;
pub use cache::*;
pub use chain::*;
pub use error::*;
pub use keys::*;
