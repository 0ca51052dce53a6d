//! Error types for reviewgate-state

use thiserror::Error;

/// Errors produced by audit ledger implementations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The change request's trail was sealed by `archive`.
    #[error("audit trail for {change_request} is archived; no further entries accepted")]
    Archived { change_request: String },

    /// Sequence numbers must increase by exactly one per entry.
    #[error("out-of-order entry for {change_request}: expected seq {expected}, got {actual}")]
    OutOfOrder {
        change_request: String,
        expected: u64,
        actual: u64,
    },

    /// Stored entry no longer matches its recorded digest.
    #[error("integrity check failed for {change_request} seq {seq}: expected {expected}, got {actual}")]
    DigestMismatch {
        change_request: String,
        seq: u64,
        expected: String,
        actual: String,
    },

    /// A digest string was not 64 lowercase hex characters.
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
