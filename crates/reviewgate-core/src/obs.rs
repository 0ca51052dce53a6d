//! Structured observability hooks for the review cycle.
//!
//! This module provides:
//! - Cycle-scoped tracing spans via the `CycleSpan` RAII guard
//! - Emission functions for stage transitions, CI triage, conflict handling,
//!   verdicts and escalations
//!
//! Events are emitted at `info!` level with a stable `event` field
//! (filter with `RUST_LOG`). Use `init_tracing(true, ..)` for JSON output.

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ChangeStatus, ConflictCategory, EscalationReason, ReviewVerdict, Triage};

/// RAII guard that enters a span tagged with the change request for the
/// duration of a review cycle.
///
/// ```ignore
/// let _span = CycleSpan::enter("pr-42", Uuid::new_v4());
/// // every event below carries change_request = "pr-42"
/// ```
pub struct CycleSpan {
    _span: tracing::span::EnteredSpan,
}

impl CycleSpan {
    pub fn enter(change_request: &str, cycle_id: Uuid) -> Self {
        Self {
            _span: cycle_span(change_request, cycle_id).entered(),
        }
    }
}

/// The cycle span itself, for instrumenting futures that must stay `Send`.
pub fn cycle_span(change_request: &str, cycle_id: Uuid) -> tracing::Span {
    tracing::info_span!(
        "reviewgate.cycle",
        change_request = %change_request,
        cycle_id = %cycle_id,
    )
}

pub fn emit_cycle_started(change_request: &str, max_iterations: u32) {
    info!(
        event = "cycle.started",
        change_request = %change_request,
        max_iterations = max_iterations,
    );
}

pub fn emit_stage_entered(change_request: &str, status: ChangeStatus, iteration_count: u32) {
    info!(
        event = "cycle.stage",
        change_request = %change_request,
        status = %status,
        iteration_count = iteration_count,
    );
}

pub fn emit_ci_triaged(change_request: &str, check: &str, triage: Triage) {
    let triage = match triage {
        Triage::InScope => "in_scope",
        Triage::OutOfScope => "out_of_scope",
    };
    info!(event = "ci.triaged", change_request = %change_request, check = %check, triage = triage);
}

pub fn emit_follow_up_filed(change_request: &str, check: &str, work_item: &str) {
    info!(
        event = "ci.follow_up_filed",
        change_request = %change_request,
        check = %check,
        work_item = %work_item,
    );
}

pub fn emit_conflict_classified(change_request: &str, path: &str, category: ConflictCategory) {
    info!(
        event = "conflict.classified",
        change_request = %change_request,
        path = %path,
        category = %category,
        simple = category.is_simple(),
    );
}

pub fn emit_conflicts_resolved(change_request: &str, regions: usize, commit: &str) {
    info!(
        event = "conflict.resolved",
        change_request = %change_request,
        regions = regions,
        commit = %commit,
    );
}

pub fn emit_iteration_recorded(
    change_request: &str,
    iteration: u32,
    verdict: ReviewVerdict,
    findings: usize,
) {
    info!(
        event = "review.iteration_recorded",
        change_request = %change_request,
        iteration = iteration,
        verdict = %verdict,
        findings = findings,
    );
}

pub fn emit_escalated(change_request: &str, reason: EscalationReason, iteration_count: u32) {
    warn!(
        event = "cycle.escalated",
        change_request = %change_request,
        reason = %reason,
        iteration_count = iteration_count,
    );
}

pub fn emit_cycle_finished(change_request: &str, verdict: &str, duration_ms: u64) {
    info!(
        event = "cycle.finished",
        change_request = %change_request,
        verdict = %verdict,
        duration_ms = duration_ms,
    );
}

/// A best-effort side effect (comment, label, verdict) failed.
pub fn emit_side_effect_error(change_request: &str, operation: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "cycle.side_effect_error",
        change_request = %change_request,
        operation = %operation,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_span_create() {
        let _span = CycleSpan::enter("pr-1", Uuid::new_v4());
        emit_stage_entered("pr-1", ChangeStatus::AwaitingCi, 0);
    }
}
