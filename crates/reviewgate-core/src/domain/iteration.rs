//! Append-only iteration audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ci::{CiRun, CiStatus};
use super::conflict::{ConflictCategory, ConflictRegion, ResolutionStrategy};
use super::finding::{FindingSnapshot, ReviewVerdict};

/// Audit ledger entry kind for iteration records.
pub const ITERATION_ENTRY_KIND: &str = "iteration";

/// How the conflict stage concluded in one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOutcome {
    NoConflicts,
    AutoResolved,
    Escalated,
    /// The iteration ended before the conflict stage ran (in-scope CI failure).
    NotEvaluated,
}

/// One region as it appears in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub path: String,
    pub category: ConflictCategory,
    pub strategy: Option<ResolutionStrategy>,
}

impl From<&ConflictRegion> for RegionSummary {
    fn from(region: &ConflictRegion) -> Self {
        Self {
            path: region.path().to_string(),
            category: region.category(),
            strategy: region.strategy(),
        }
    }
}

/// Conflict resolution summary for one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub outcome: ConflictOutcome,
    #[serde(default)]
    pub regions: Vec<RegionSummary>,
    /// Lock artifacts flagged for downstream regeneration.
    #[serde(default)]
    pub regenerate: Vec<String>,
    /// Synthetic resolution commit, when one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_commit: Option<String>,
}

impl ConflictSummary {
    pub fn none() -> Self {
        Self {
            outcome: ConflictOutcome::NoConflicts,
            regions: Vec::new(),
            regenerate: Vec::new(),
            resolution_commit: None,
        }
    }

    pub fn not_evaluated() -> Self {
        Self {
            outcome: ConflictOutcome::NotEvaluated,
            ..Self::none()
        }
    }
}

/// CI contribution to an iteration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiSummary {
    pub status: CiStatus,
    #[serde(default)]
    pub failed_checks: Vec<String>,
    #[serde(default)]
    pub in_scope: Vec<String>,
    #[serde(default)]
    pub out_of_scope: Vec<String>,
    /// Follow-up work items filed for out-of-scope failures.
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl CiSummary {
    pub fn from_run(run: &CiRun, follow_ups: Vec<String>) -> Self {
        Self {
            status: run.status,
            failed_checks: run.failed_check_names(),
            in_scope: run.in_scope().map(|t| t.check.clone()).collect(),
            out_of_scope: run.out_of_scope().map(|t| t.check.clone()).collect(),
            follow_ups,
        }
    }
}

/// One append-only audit entry per evaluated iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: u32,
    pub verdict: ReviewVerdict,
    pub findings: FindingSnapshot,
    pub conflicts: ConflictSummary,
    pub ci: CiSummary,
    /// Revision the iteration evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl IterationRecord {
    pub fn new(
        iteration: u32,
        findings: FindingSnapshot,
        conflicts: ConflictSummary,
        ci: CiSummary,
    ) -> Self {
        Self {
            iteration,
            verdict: findings.verdict(),
            findings,
            conflicts,
            ci,
            revision: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ci::{Check, CheckStatus, CheckTriage, Triage};
    use crate::domain::finding::{Dimension, ReviewFinding};

    #[test]
    fn test_record_verdict_follows_findings() {
        let findings =
            FindingSnapshot::new(vec![ReviewFinding::should_fix(Dimension::CommitFormat, "x")]);
        let ci = CiSummary::from_run(&CiRun::from_checks(vec![]), vec![]);
        let record = IterationRecord::new(1, findings, ConflictSummary::none(), ci);
        assert_eq!(record.verdict, ReviewVerdict::ChangesRequested);
    }

    #[test]
    fn test_ci_summary_splits_triage() {
        let mut run = CiRun::from_checks(vec![
            Check::new("unit", CheckStatus::Failure),
            Check::new("e2e", CheckStatus::Failure),
        ]);
        run.triage = vec![
            CheckTriage {
                check: "unit".into(),
                triage: Triage::InScope,
                referenced_files: vec!["src/a.rs".into()],
            },
            CheckTriage {
                check: "e2e".into(),
                triage: Triage::OutOfScope,
                referenced_files: vec![],
            },
        ];
        let summary = CiSummary::from_run(&run, vec!["TRK-9".into()]);
        assert_eq!(summary.in_scope, vec!["unit".to_string()]);
        assert_eq!(summary.out_of_scope, vec!["e2e".to_string()]);
        assert_eq!(summary.failed_checks.len(), 2);
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let record = IterationRecord::new(
            2,
            FindingSnapshot::default(),
            ConflictSummary::not_evaluated(),
            CiSummary::from_run(&CiRun::from_checks(vec![]), vec![]),
        )
        .with_revision(Some("abc123".into()));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["conflicts"]["outcome"], "not_evaluated");
        let back: IterationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
