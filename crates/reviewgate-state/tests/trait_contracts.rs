//! Trait contract tests for AuditLedger.
//!
//! Every conforming implementation must pass these; each test runs against
//! the in-memory fake and the filesystem ledger.

use reviewgate_state::fakes::MemoryAuditLedger;
use reviewgate_state::storage_traits::*;
use reviewgate_state::{FsAuditLedger, StorageError};
use serde_json::json;

fn ledgers() -> (Vec<Box<dyn AuditLedger>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let ledgers: Vec<Box<dyn AuditLedger>> = vec![
        Box::new(MemoryAuditLedger::new()),
        Box::new(FsAuditLedger::new(dir.path().join("audit"))),
    ];
    (ledgers, dir)
}

#[tokio::test]
async fn unknown_change_request_has_empty_trail() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        assert!(ledger.entries("nope").await.unwrap().is_empty());
        assert!(ledger.archive_summary("nope").await.unwrap().is_none());
        assert_eq!(ledger.next_seq("nope").await.unwrap(), 1);
    }
}

#[tokio::test]
async fn entries_preserve_insertion_order() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        for seq in 1..=3 {
            ledger
                .append("pr-7", AuditEntry::new(seq, "iteration", json!({ "n": seq })))
                .await
                .unwrap();
        }
        let entries = ledger.entries("pr-7").await.unwrap();
        let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(entries[2].payload["n"], 3);
        assert_eq!(ledger.next_seq("pr-7").await.unwrap(), 4);
    }
}

#[tokio::test]
async fn out_of_order_append_is_rejected() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        let err = ledger
            .append("pr-1", AuditEntry::new(2, "iteration", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::OutOfOrder {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn trails_are_isolated_per_change_request() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        ledger
            .append("pr-a", AuditEntry::new(1, "iteration", json!({})))
            .await
            .unwrap();
        assert!(ledger.entries("pr-b").await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn archive_seals_trail() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        ledger
            .append("pr-9", AuditEntry::new(1, "iteration", json!({})))
            .await
            .unwrap();
        let summary = ledger.archive("pr-9", "approved").await.unwrap();
        assert_eq!(summary.total_entries, 1);
        assert_eq!(summary.terminal_status, "approved");

        let err = ledger
            .append("pr-9", AuditEntry::new(2, "iteration", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Archived { .. }));

        let again = ledger.archive("pr-9", "escalated").await.unwrap_err();
        assert!(matches!(again, StorageError::Archived { .. }));

        let stored = ledger.archive_summary("pr-9").await.unwrap().unwrap();
        assert_eq!(stored.terminal_status, "approved");
        assert_eq!(ledger.entries("pr-9").await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn fs_ledger_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = FsAuditLedger::new(dir.path());
        ledger
            .append("org/repo#12", AuditEntry::new(1, "iteration", json!({"v": "x"})))
            .await
            .unwrap();
    }
    let reopened = FsAuditLedger::new(dir.path());
    let entries = reopened.entries("org/repo#12").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload["v"], "x");
}

#[tokio::test]
async fn ids_differing_only_in_punctuation_do_not_share_a_trail() {
    let (ledgers, _dir) = ledgers();
    for ledger in &ledgers {
        ledger
            .append("org/repo#7", AuditEntry::new(1, "iteration", json!({})))
            .await
            .unwrap();
        ledger.archive("org/repo#7", "approved").await.unwrap();

        assert!(ledger.archive_summary("org_repo_7").await.unwrap().is_none());
        assert!(ledger.entries("org_repo_7").await.unwrap().is_empty());
        ledger
            .append("org_repo_7", AuditEntry::new(1, "iteration", json!({})))
            .await
            .unwrap();
        assert_eq!(ledger.entries("org/repo#7").await.unwrap().len(), 1);
    }
}
