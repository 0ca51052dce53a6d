//! CI checks, runs and failure triage.

use serde::{Deserialize, Serialize};

/// Status of one CI check as reported by the CI service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Success,
    Failure,
    Cancelled,
    Skipped,
    Neutral,
}

impl CheckStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CheckStatus::Queued | CheckStatus::InProgress)
    }

    /// Cancelled checks count as failures: they never produced a green signal.
    pub fn is_failure(self) -> bool {
        matches!(self, CheckStatus::Failure | CheckStatus::Cancelled)
    }
}

/// One CI check with its log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub status: CheckStatus,
    /// Raw log text (possibly truncated by the CI service).
    #[serde(default)]
    pub log: String,
}

impl Check {
    pub fn new(name: impl Into<String>, status: CheckStatus) -> Self {
        Self {
            name: name.into(),
            status,
            log: String::new(),
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }
}

/// Overall status of a CI evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiStatus {
    Pending,
    Success,
    Failure,
}

/// Whether a failed check was caused by the change under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Triage {
    InScope,
    OutOfScope,
}

/// Triage classification of one failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTriage {
    pub check: String,
    pub triage: Triage,
    /// Changed files the failure log references (empty when out of scope).
    pub referenced_files: Vec<String>,
}

/// One CI evaluation. Fetched fresh every iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiRun {
    pub status: CiStatus,
    pub checks: Vec<Check>,
    /// Filled in by the monitor once the diff is known.
    #[serde(default)]
    pub triage: Vec<CheckTriage>,
}

impl CiRun {
    /// Derive the overall status from individual checks.
    ///
    /// Any non-terminal check keeps the run `Pending`; otherwise a single
    /// failing check makes it `Failure`.
    pub fn from_checks(checks: Vec<Check>) -> Self {
        let status = if checks.iter().any(|c| !c.status.is_terminal()) {
            CiStatus::Pending
        } else if checks.iter().any(|c| c.status.is_failure()) {
            CiStatus::Failure
        } else {
            CiStatus::Success
        };
        Self {
            status,
            checks,
            triage: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status != CiStatus::Pending
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.status.is_failure())
    }

    pub fn failed_check_names(&self) -> Vec<String> {
        self.failed_checks().map(|c| c.name.clone()).collect()
    }

    pub fn in_scope(&self) -> impl Iterator<Item = &CheckTriage> {
        self.triage.iter().filter(|t| t.triage == Triage::InScope)
    }

    pub fn out_of_scope(&self) -> impl Iterator<Item = &CheckTriage> {
        self.triage.iter().filter(|t| t.triage == Triage::OutOfScope)
    }

    pub fn has_in_scope_failures(&self) -> bool {
        self.in_scope().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_pending_while_any_check_running() {
        let run = CiRun::from_checks(vec![
            Check::new("build", CheckStatus::Failure),
            Check::new("test", CheckStatus::InProgress),
        ]);
        assert_eq!(run.status, CiStatus::Pending);
        assert!(!run.is_complete());
    }

    #[test]
    fn test_status_failure_when_complete_with_failure() {
        let run = CiRun::from_checks(vec![
            Check::new("build", CheckStatus::Success),
            Check::new("lint", CheckStatus::Cancelled),
            Check::new("docs", CheckStatus::Skipped),
        ]);
        assert_eq!(run.status, CiStatus::Failure);
        assert_eq!(run.failed_check_names(), vec!["lint".to_string()]);
    }

    #[test]
    fn test_status_success_with_neutral_and_skipped() {
        let run = CiRun::from_checks(vec![
            Check::new("build", CheckStatus::Success),
            Check::new("docs", CheckStatus::Neutral),
            Check::new("e2e", CheckStatus::Skipped),
        ]);
        assert_eq!(run.status, CiStatus::Success);
    }

    #[test]
    fn test_no_checks_is_success() {
        assert_eq!(CiRun::from_checks(vec![]).status, CiStatus::Success);
    }
}
