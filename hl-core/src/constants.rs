//! Protocol Constants
//!
//! Centralized constants for the HodeauxLedger protocol. Magic numbers,
//! default limits and wire-level sentinels live here.

// ============================================================================
// Record Types
// ============================================================================

/// Record type of a scope's first record
pub const GENESIS_RECORD_TYPE: &str = "genesis";

/// Separator between category and action in a record type
pub const RECORD_TYPE_SEPARATOR: char = ':';

/// Separator between scope segments
pub const SCOPE_SEPARATOR: char = '.';

/// Name of the root scope
pub const ROOT_SCOPE: &str = "";

// ============================================================================
// Roles
// ============================================================================

/// Role granted to the key embedded in a genesis record
pub const CORE_ROLE: &str = "core";

// ============================================================================
// Size Limits
// ============================================================================

/// Maximum canonical size of a submitted record in bytes
pub const MAX_RECORD_BYTES: usize = 1024;

/// Maximum scope name length
pub const MAX_SCOPE_LENGTH: usize = 255;

/// Maximum record type length
pub const MAX_RECORD_TYPE_LENGTH: usize = 255;

/// Length of a base64 SHA-256 digest with padding
pub const HASH_B64_LENGTH: usize = 44;

/// Raw digest length in bytes
pub const HASH_BYTES: usize = 32;

// ============================================================================
// Time
// ============================================================================

/// Microseconds in one sidereal turn
pub const MICROS_PER_TURN: u128 = 86_164_090_500;

/// Micromarks in one turn
pub const MICROMARKS_PER_TURN: u128 = 1_000_000_000;

/// Default ledger epoch (Unix milliseconds)
pub const DEFAULT_EPOCH_MS: i64 = 1_752_941_587_614;

/// Timestamp stamped on the root genesis record
pub const GENESIS_AT: &str = "0";

// ============================================================================
// Storage
// ============================================================================

/// Attachment key of a scope's genesis blob
pub const GENESIS_ATTACHMENT_KEY: &str = "genesis";
