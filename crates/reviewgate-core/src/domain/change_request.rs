//! Change requests and their review status machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{GateError, GateResult};

/// Default bound on fix iterations per change request.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Identifier of a change request on the version-control platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeRequestId(String);

impl ChangeRequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeRequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChangeRequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Review status of a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Created,
    AwaitingCi,
    ResolvingConflicts,
    UnderReview,
    ChangesRequested,
    AwaitingFix,
    Approved,
    Escalated,
}

impl ChangeStatus {
    /// `Approved` and `Escalated` end the cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChangeStatus::Approved | ChangeStatus::Escalated)
    }

    /// Whether `self -> next` is an edge of the review state machine.
    ///
    /// Escalation is reachable from every non-terminal state because
    /// infrastructure failures can surface at any stage.
    pub fn can_transition_to(self, next: ChangeStatus) -> bool {
        use ChangeStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Escalated {
            return true;
        }
        matches!(
            (self, next),
            (Created, AwaitingCi)
                | (AwaitingCi, ResolvingConflicts)
                | (AwaitingCi, ChangesRequested)
                | (ResolvingConflicts, UnderReview)
                | (UnderReview, Approved)
                | (UnderReview, ChangesRequested)
                | (ChangesRequested, AwaitingFix)
                | (AwaitingFix, AwaitingCi)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeStatus::Created => "created",
            ChangeStatus::AwaitingCi => "awaiting_ci",
            ChangeStatus::ResolvingConflicts => "resolving_conflicts",
            ChangeStatus::UnderReview => "under_review",
            ChangeStatus::ChangesRequested => "changes_requested",
            ChangeStatus::AwaitingFix => "awaiting_fix",
            ChangeStatus::Approved => "approved",
            ChangeStatus::Escalated => "escalated",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed, reviewable code change.
///
/// `status` and `iteration_count` are private so every mutation goes through
/// [`ChangeRequest::transition_to`], which enforces the state machine, the
/// terminal-state freeze and the iteration bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: ChangeRequestId,
    /// Branch carrying the proposed change.
    pub source_ref: String,
    /// Branch the change will be integrated into.
    pub target_ref: String,
    /// Linked work item on the tracker, if any.
    pub work_item: Option<String>,
    /// Head revision last observed for `source_ref`.
    pub revision: Option<String>,
    status: ChangeStatus,
    iteration_count: u32,
    max_iterations: u32,
}

impl ChangeRequest {
    pub fn new(
        id: impl Into<ChangeRequestId>,
        source_ref: impl Into<String>,
        target_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_ref: source_ref.into(),
            target_ref: target_ref.into(),
            work_item: None,
            revision: None,
            status: ChangeStatus::Created,
            iteration_count: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_work_item(mut self, work_item: impl Into<String>) -> Self {
        self.work_item = Some(work_item.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Set the iteration bound; at least one iteration is required.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> GateResult<Self> {
        if max_iterations == 0 {
            return Err(GateError::Config(format!(
                "max_iterations for {} must be at least 1",
                self.id
            )));
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    /// Resume with `completed` iterations already consumed by earlier runs.
    ///
    /// A count above the bound is kept as is; the next review round then
    /// escalates instead of requesting changes.
    pub fn with_completed_iterations(mut self, completed: u32) -> Self {
        self.iteration_count = completed;
        self
    }

    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Whether another `ChangesRequested` round fits in the budget.
    pub fn has_iterations_left(&self) -> bool {
        self.iteration_count < self.max_iterations
    }

    /// Move to `next`.
    ///
    /// Entering `ChangesRequested` consumes one iteration and fails once the
    /// budget is spent; the caller must escalate instead.
    pub fn transition_to(&mut self, next: ChangeStatus) -> GateResult<()> {
        if self.status.is_terminal() {
            return Err(GateError::TerminalState {
                change_request: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(GateError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if next == ChangeStatus::ChangesRequested {
            if !self.has_iterations_left() {
                return Err(GateError::InvalidTransition {
                    from: self.status.to_string(),
                    to: format!(
                        "{next} (iteration budget {} exhausted)",
                        self.max_iterations
                    ),
                });
            }
            self.iteration_count += 1;
        }
        self.status = next;
        Ok(())
    }
}
