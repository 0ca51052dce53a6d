//! Terminal verdicts and escalation reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::change_request::ChangeRequestId;
use super::conflict::{ConflictCategory, ConflictRegion};
use super::finding::Dimension;
use super::iteration::IterationRecord;

/// Why automated handling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Collaborator faults persisted after the retry budget.
    Infrastructure,
    CiTimeout,
    /// In-scope CI failures outlived the iteration budget.
    CiFailure,
    ComplexConflict,
    IterationLimit,
}

impl EscalationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EscalationReason::Infrastructure => "infrastructure",
            EscalationReason::CiTimeout => "ci_timeout",
            EscalationReason::CiFailure => "ci_failure",
            EscalationReason::ComplexConflict => "complex_conflict",
            EscalationReason::IterationLimit => "iteration_limit",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EscalationReason::Infrastructure => "Infrastructure failure",
            EscalationReason::CiTimeout => "CI did not complete in time",
            EscalationReason::CiFailure => "CI failures were not fixed",
            EscalationReason::ComplexConflict => "Merge conflicts need a human",
            EscalationReason::IterationLimit => "Review iteration limit reached",
        }
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complex conflict region, with everything a human needs to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalatedRegion {
    pub path: String,
    pub category: ConflictCategory,
    pub ours: String,
    pub theirs: String,
    pub guidance: String,
}

impl From<&ConflictRegion> for EscalatedRegion {
    fn from(region: &ConflictRegion) -> Self {
        Self {
            path: region.path().to_string(),
            category: region.category(),
            ours: region.ours().to_string(),
            theirs: region.theirs().to_string(),
            guidance: region.category().guidance().to_string(),
        }
    }
}

/// A finding that kept coming back across iterations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub dimension: Dimension,
    pub file: Option<String>,
    pub message: String,
    /// Iterations the finding appeared in, ascending.
    pub iterations: Vec<u32>,
}

/// Structured report attached to every escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationReport {
    pub change_request: ChangeRequestId,
    pub reason: EscalationReason,
    pub iteration_count: u32,
    pub max_iterations: u32,
    /// One-line cause (error text, timeout window, ...).
    pub detail: String,
    #[serde(default)]
    pub unresolved_conflicts: Vec<EscalatedRegion>,
    /// Conflicts that would have been auto-resolved had the batch been all simple.
    #[serde(default)]
    pub resolvable_conflicts: Vec<EscalatedRegion>,
    #[serde(default)]
    pub history: Vec<IterationRecord>,
    #[serde(default)]
    pub recurring: Vec<RecurringPattern>,
    /// Markdown rendering posted to the platform.
    pub markdown: String,
}

/// Final outcome of `run_cycle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum TerminalVerdict {
    Approved {
        change_request: ChangeRequestId,
        /// Iteration whose review approved the change.
        iteration: u32,
        iteration_count: u32,
    },
    Escalated(EscalationReport),
}

impl TerminalVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, TerminalVerdict::Approved { .. })
    }

    pub fn escalation(&self) -> Option<&EscalationReport> {
        match self {
            TerminalVerdict::Escalated(report) => Some(report),
            TerminalVerdict::Approved { .. } => None,
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            TerminalVerdict::Approved { .. } => "approved",
            TerminalVerdict::Escalated(_) => "escalated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_verdict_serde_tagged() {
        let verdict = TerminalVerdict::Approved {
            change_request: "pr-1".into(),
            iteration: 1,
            iteration_count: 0,
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["verdict"], "approved");
        assert_eq!(json["change_request"], "pr-1");
        assert!(verdict.is_approved());
        assert!(verdict.escalation().is_none());
    }

    #[test]
    fn test_escalation_reason_strings() {
        assert_eq!(EscalationReason::IterationLimit.to_string(), "iteration_limit");
        assert!(!EscalationReason::ComplexConflict.title().is_empty());
    }
}
