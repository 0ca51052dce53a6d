//! Storage trait definitions for reviewgate
//!
//! `AuditLedger` is the append-only store behind a change request's audit
//! trail. Entries carry an opaque JSON payload so this layer stays free of
//! review-domain types; `reviewgate-core` decides what goes in them.
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// AuditLedger
// ---------------------------------------------------------------------------

/// One entry in a change request's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number within the trail, starting at 1.
    pub seq: u64,
    /// Entry kind (e.g. "iteration_recorded").
    pub kind: String,
    /// Entry payload
    pub payload: serde_json::Value,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry stamped with the current time.
    pub fn new(seq: u64, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            seq,
            kind: kind.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Digest over the canonical JSON encoding of this entry.
    pub fn digest(&self) -> StorageResult<ContentDigest> {
        let bytes = serde_json::to_vec(self)?;
        Ok(ContentDigest::from_bytes(&bytes))
    }
}

/// Final state recorded when a trail is sealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Terminal status label (e.g. "approved", "escalated").
    pub terminal_status: String,
    /// Number of entries in the sealed trail.
    pub total_entries: u64,
    /// When the trail was sealed.
    pub archived_at: DateTime<Utc>,
}

/// Append-only audit ledger keyed by change-request identifier.
///
/// Guarantees:
/// - Entries are returned in insertion order; `seq` increases by one per entry.
/// - Entries are never reordered, rewritten or deleted.
/// - After `archive`, the trail is immutable and `append` fails with
///   [`StorageError::Archived`].
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Append an entry. `entry.seq` must equal the current length plus one.
    async fn append(&self, change_request: &str, entry: AuditEntry) -> StorageResult<()>;

    /// All entries for a change request, ordered by seq. Unknown ids yield an empty list.
    async fn entries(&self, change_request: &str) -> StorageResult<Vec<AuditEntry>>;

    /// Seal the trail. Archiving twice is an error.
    async fn archive(&self, change_request: &str, terminal_status: &str)
        -> StorageResult<ArchiveSummary>;

    /// The archive summary, if the trail has been sealed.
    async fn archive_summary(&self, change_request: &str) -> StorageResult<Option<ArchiveSummary>>;

    /// Next sequence number to use for an append.
    async fn next_seq(&self, change_request: &str) -> StorageResult<u64> {
        Ok(self.entries(change_request).await?.len() as u64 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_same_bytes() {
        assert_eq!(
            ContentDigest::from_bytes(b"abc"),
            ContentDigest::from_bytes(b"abc")
        );
        assert_eq!(ContentDigest::from_bytes(b"abc").short().len(), 12);
    }

    #[test]
    fn digest_rejects_non_hex() {
        let err = ContentDigest::try_from("zz".repeat(32)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidDigest { .. }));
    }

    #[test]
    fn digest_serde_validates_on_read() {
        let good = ContentDigest::from_bytes(b"x");
        let json = serde_json::to_string(&good).unwrap();
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(good, back);

        let bad: Result<ContentDigest, _> = serde_json::from_str("\"nothex\"");
        assert!(bad.is_err());
    }

    #[test]
    fn entry_digest_changes_with_payload() {
        let a = AuditEntry::new(1, "k", serde_json::json!({"v": 1}));
        let mut b = a.clone();
        b.payload = serde_json::json!({"v": 2});
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
