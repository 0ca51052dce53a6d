//! Filesystem-backed audit ledger.
//!
//! Layout under the ledger root:
//!
//! ```text
//! <root>/<change-request>/trail.jsonl   one sealed entry per line
//! <root>/<change-request>/archive.json  present once the trail is sealed
//! ```
//!
//! Every line stores the entry together with the SHA-256 digest of its JSON
//! encoding; reads re-compute the digest and fail on mismatch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Serialize, Deserialize)]
struct SealedLine {
    entry: AuditEntry,
    digest: ContentDigest,
}

/// Audit ledger persisted as JSON lines on disk.
#[derive(Debug)]
pub struct FsAuditLedger {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsAuditLedger {
    /// Open (or lazily create) a ledger rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ledger root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn trail_dir(&self, change_request: &str) -> PathBuf {
        self.root.join(encode_key(change_request))
    }

    async fn read_entries(&self, change_request: &str) -> StorageResult<Vec<AuditEntry>> {
        let path = self.trail_dir(change_request).join("trail.jsonl");
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            let sealed: SealedLine = serde_json::from_str(line)?;
            let actual = sealed.entry.digest()?;
            if actual != sealed.digest {
                return Err(StorageError::DigestMismatch {
                    change_request: change_request.to_string(),
                    seq: sealed.entry.seq,
                    expected: sealed.digest.to_string(),
                    actual: actual.to_string(),
                });
            }
            entries.push(sealed.entry);
        }
        Ok(entries)
    }

    async fn read_archive(&self, change_request: &str) -> StorageResult<Option<ArchiveSummary>> {
        let path = self.trail_dir(change_request).join("archive.json");
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Map an arbitrary identifier onto a single safe path component.
///
/// ASCII letters, digits and `-` pass through; every other byte becomes
/// `_XX` (uppercase hex). `_` itself is escaped, so distinct ids never share
/// a component, and the result never contains `.` or `/`.
pub fn encode_key(key: &str) -> String {
    if key.is_empty() {
        return "_".to_string();
    }
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{byte:02X}"));
        }
    }
    encoded
}

#[async_trait]
impl AuditLedger for FsAuditLedger {
    async fn append(&self, change_request: &str, entry: AuditEntry) -> StorageResult<()> {
        let _guard = self.write_lock.lock().await;

        if self.read_archive(change_request).await?.is_some() {
            return Err(StorageError::Archived {
                change_request: change_request.to_string(),
            });
        }
        let existing = self.read_entries(change_request).await?;
        let expected = existing.len() as u64 + 1;
        if entry.seq != expected {
            return Err(StorageError::OutOfOrder {
                change_request: change_request.to_string(),
                expected,
                actual: entry.seq,
            });
        }

        let dir = self.trail_dir(change_request);
        tokio::fs::create_dir_all(&dir).await?;
        let digest = entry.digest()?;
        let mut line = serde_json::to_string(&SealedLine { entry, digest })?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("trail.jsonl"))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        debug!(change_request = %change_request, seq = expected, "audit entry appended");
        Ok(())
    }

    async fn entries(&self, change_request: &str) -> StorageResult<Vec<AuditEntry>> {
        self.read_entries(change_request).await
    }

    async fn archive(
        &self,
        change_request: &str,
        terminal_status: &str,
    ) -> StorageResult<ArchiveSummary> {
        let _guard = self.write_lock.lock().await;

        if self.read_archive(change_request).await?.is_some() {
            return Err(StorageError::Archived {
                change_request: change_request.to_string(),
            });
        }
        let entries = self.read_entries(change_request).await?;
        let summary = ArchiveSummary {
            terminal_status: terminal_status.to_string(),
            total_entries: entries.len() as u64,
            archived_at: Utc::now(),
        };

        let dir = self.trail_dir(change_request);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join("archive.json"), serde_json::to_vec_pretty(&summary)?).await?;
        Ok(summary)
    }

    async fn archive_summary(&self, change_request: &str) -> StorageResult<Option<ArchiveSummary>> {
        self.read_archive(change_request).await
    }
}
