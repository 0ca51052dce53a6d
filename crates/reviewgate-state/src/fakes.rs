//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryAuditLedger`, which satisfies the `AuditLedger` contract
//! without touching the filesystem.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct TrailState {
    entries: Vec<AuditEntry>,
    archived: Option<ArchiveSummary>,
}

/// In-memory audit ledger backed by a `HashMap<change_request, TrailState>`.
#[derive(Debug, Default)]
pub struct MemoryAuditLedger {
    trails: Mutex<HashMap<String, TrailState>>,
}

impl MemoryAuditLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLedger for MemoryAuditLedger {
    async fn append(&self, change_request: &str, entry: AuditEntry) -> StorageResult<()> {
        let mut trails = self.trails.lock().unwrap();
        let trail = trails.entry(change_request.to_string()).or_default();
        if trail.archived.is_some() {
            return Err(StorageError::Archived {
                change_request: change_request.to_string(),
            });
        }
        let expected = trail.entries.len() as u64 + 1;
        if entry.seq != expected {
            return Err(StorageError::OutOfOrder {
                change_request: change_request.to_string(),
                expected,
                actual: entry.seq,
            });
        }
        trail.entries.push(entry);
        Ok(())
    }

    async fn entries(&self, change_request: &str) -> StorageResult<Vec<AuditEntry>> {
        let trails = self.trails.lock().unwrap();
        Ok(trails
            .get(change_request)
            .map(|t| t.entries.clone())
            .unwrap_or_default())
    }

    async fn archive(
        &self,
        change_request: &str,
        terminal_status: &str,
    ) -> StorageResult<ArchiveSummary> {
        let mut trails = self.trails.lock().unwrap();
        let trail = trails.entry(change_request.to_string()).or_default();
        if trail.archived.is_some() {
            return Err(StorageError::Archived {
                change_request: change_request.to_string(),
            });
        }
        let summary = ArchiveSummary {
            terminal_status: terminal_status.to_string(),
            total_entries: trail.entries.len() as u64,
            archived_at: Utc::now(),
        };
        trail.archived = Some(summary.clone());
        Ok(summary)
    }

    async fn archive_summary(&self, change_request: &str) -> StorageResult<Option<ArchiveSummary>> {
        let trails = self.trails.lock().unwrap();
        Ok(trails.get(change_request).and_then(|t| t.archived.clone()))
    }
}
