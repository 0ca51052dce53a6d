//! reviewgate-state: audit persistence for review cycles
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append-only history and tamper evidence. This crate knows nothing
//! about change requests beyond their identifier; payloads are opaque JSON.
//!
//! ## Key Components
//!
//! - `AuditLedger`: append / read / archive contract
//! - `MemoryAuditLedger`: in-memory fake for tests
//! - `FsAuditLedger`: JSON-lines ledger with per-entry SHA-256 digests

mod error;
pub mod fakes;
pub mod fs_ledger;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_ledger::{encode_key, FsAuditLedger};
pub use storage_traits::{
    ArchiveSummary, AuditEntry, AuditLedger, ContentDigest, StorageResult,
};
