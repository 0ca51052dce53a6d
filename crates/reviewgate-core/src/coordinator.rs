//! Review Cycle Coordinator.
//!
//! Drives one change request through bounded iterations of
//! CI -> conflicts -> review until it is approved or escalated:
//!
//! ```text
//! Created -> AwaitingCi -> ResolvingConflicts -> UnderReview -> Approved
//!               |  ^                                  |
//!               |  +-- AwaitingFix <-- ChangesRequested
//!               +--------------------------------------> Escalated
//! ```
//!
//! Stages run strictly in sequence. Every evaluated iteration is appended to
//! the audit ledger; the trail is archived once a terminal verdict is
//! reached. The coordinator is the only component that decides terminal
//! states: components surface errors, and the coordinator maps the
//! escalating ones (exhausted retries, CI timeout, collaborator failures)
//! to an [`EscalationReason`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use reviewgate_state::{AuditEntry, AuditLedger};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use crate::ci_monitor::{follow_up_for, CiMonitor};
use crate::collaborators::{
    ChangeImplementer, ContinuousIntegrationService, MergeWorkspace, PlatformVerdict, RepoPaths,
    StaticAnalysisTool, VersionControlPlatform, WorkItem, WorkItemTracker,
};
use crate::config::GateConfig;
use crate::conflict::{
    ConflictClassifier, ConflictDetector, ConflictResolver, Detection, ResolveOutcome,
};
use crate::diff::parse_unified_diff;
use crate::domain::{
    ChangeRequest, ChangeRequestId, ChangeStatus, CiRun, CiSummary, ConflictOutcome,
    ConflictRegion, ConflictSummary, Dimension, EscalationReason, FindingSnapshot, GateError,
    GateResult, IterationRecord, ReviewFinding, ReviewVerdict, TerminalVerdict,
    ITERATION_ENTRY_KIND,
};
use crate::lock::LockRegistry;
use crate::metrics::METRICS;
use crate::obs;
use crate::report::{render_findings, ReportBuilder};
use crate::retry::with_retry;
use crate::review::{ChangeEvidence, QualityReviewer};

/// Audit ledger entry kind for the terminal verdict.
pub const VERDICT_ENTRY_KIND: &str = "verdict";

/// External systems the coordinator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub platform: Arc<dyn VersionControlPlatform>,
    pub workspace: Arc<dyn MergeWorkspace>,
    pub ci: Arc<dyn ContinuousIntegrationService>,
    pub tracker: Arc<dyn WorkItemTracker>,
    pub analyzer: Arc<dyn StaticAnalysisTool>,
    pub implementer: Arc<dyn ChangeImplementer>,
    pub repo_paths: Arc<dyn RepoPaths>,
}

/// Operator-side cancellation flag.
///
/// Checked only between stages; the conflict detect/resolve unit always
/// runs to completion once started.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the next cycle can run.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Why a pass stopped short of approval.
struct Escalation {
    reason: EscalationReason,
    detail: String,
    unresolved: Vec<ConflictRegion>,
    resolvable: Vec<ConflictRegion>,
}

impl Escalation {
    fn new(reason: EscalationReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
            unresolved: Vec::new(),
            resolvable: Vec::new(),
        }
    }
}

enum PassOutcome {
    Approved { iteration: u32 },
    /// A new revision was observed; run another pass.
    Revised,
    Escalate(Escalation),
}

/// Mutable state of one `run_cycle` call.
struct CycleState {
    /// Correlates log lines and the verdict entry of one call.
    cycle_id: Uuid,
    history: Vec<IterationRecord>,
    /// Checks a follow-up was already filed for.
    followed_up: HashSet<String>,
}

impl CycleState {
    /// `history` holds records left by earlier, non-terminal runs.
    fn new(cycle_id: Uuid, history: Vec<IterationRecord>) -> Self {
        Self {
            cycle_id,
            history,
            followed_up: HashSet::new(),
        }
    }
}

/// Errors that end the cycle in `Escalated` instead of propagating.
fn escalation_for(err: &GateError) -> Option<Escalation> {
    let reason = match err {
        GateError::TransientInfra { .. }
        | GateError::Collaborator { .. }
        | GateError::Git(_) => EscalationReason::Infrastructure,
        GateError::CiTimeout { .. } => EscalationReason::CiTimeout,
        _ => return None,
    };
    Some(Escalation::new(reason, err.to_string()))
}

/// `Blocking` findings for failures the change caused.
fn ci_findings(run: &CiRun) -> Vec<ReviewFinding> {
    run.in_scope()
        .map(|t| {
            let finding = ReviewFinding::blocking(
                Dimension::ContinuousIntegration,
                format!(
                    "CI check `{}` failed in changed code ({})",
                    t.check,
                    t.referenced_files.join(", ")
                ),
            );
            match t.referenced_files.first() {
                Some(file) => finding.at(file.clone(), None),
                None => finding,
            }
        })
        .collect()
}

pub struct ReviewCycleCoordinator {
    config: GateConfig,
    collaborators: Collaborators,
    ledger: Arc<dyn AuditLedger>,
    locks: LockRegistry,
    monitor: CiMonitor,
    detector: ConflictDetector,
    resolver: ConflictResolver,
    reviewer: QualityReviewer,
    cancel: CancellationHandle,
}

impl ReviewCycleCoordinator {
    pub fn new(
        config: GateConfig,
        collaborators: Collaborators,
        ledger: Arc<dyn AuditLedger>,
    ) -> GateResult<Self> {
        config.validate()?;
        let locks = match &config.lock_dir {
            Some(dir) => LockRegistry::with_lock_dir(dir),
            None => LockRegistry::new(),
        };
        let monitor = CiMonitor::new(
            Arc::clone(&collaborators.ci),
            config.retry.clone(),
            config.ci_poll_interval(),
        );
        let detector = ConflictDetector::new(
            Arc::clone(&collaborators.workspace),
            ConflictClassifier::new(config.lockfile_names.clone()),
        );
        let resolver = ConflictResolver::new(Arc::clone(&collaborators.workspace));
        let reviewer = QualityReviewer::new(
            &config,
            Arc::clone(&collaborators.analyzer),
            Arc::clone(&collaborators.repo_paths),
        )?;
        Ok(Self {
            config,
            collaborators,
            ledger,
            locks,
            monitor,
            detector,
            resolver,
            reviewer,
            cancel: CancellationHandle::default(),
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Handle that cancels cycles run by this coordinator.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Run a cycle with the configured iteration bound.
    pub async fn run_cycle(&self, id: &ChangeRequestId) -> GateResult<TerminalVerdict> {
        self.run_cycle_with_limit(id, self.config.max_iterations).await
    }

    /// Run one review cycle to a terminal verdict.
    ///
    /// Fails fast with [`GateError::LockHeld`] when another cycle for `id`
    /// is active, and with [`GateError::TerminalState`] when `id` already
    /// reached a verdict. A cancelled cycle returns [`GateError::Cancelled`]
    /// and leaves the trail open.
    pub async fn run_cycle_with_limit(
        &self,
        id: &ChangeRequestId,
        max_iterations: u32,
    ) -> GateResult<TerminalVerdict> {
        if max_iterations == 0 {
            return Err(GateError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        let _lock = self.locks.try_acquire(id)?;
        let cycle_id = Uuid::new_v4();
        self.run_locked(id, max_iterations, cycle_id)
            .instrument(obs::cycle_span(id.as_str(), cycle_id))
            .await
    }

    /// Iteration records for `id`, oldest first.
    pub async fn get_audit_trail(&self, id: &ChangeRequestId) -> GateResult<Vec<IterationRecord>> {
        read_audit_trail(self.ledger.as_ref(), id).await
    }

    async fn run_locked(
        &self,
        id: &ChangeRequestId,
        max_iterations: u32,
        cycle_id: Uuid,
    ) -> GateResult<TerminalVerdict> {
        if let Some(archived) = self.ledger.archive_summary(id.as_str()).await? {
            return Err(GateError::TerminalState {
                change_request: id.to_string(),
                status: archived.terminal_status,
            });
        }
        let started = Instant::now();
        // A cancelled run leaves its records behind; they count against the
        // bound of this change request.
        let prior = read_audit_trail(self.ledger.as_ref(), id).await?;
        let completed = prior
            .iter()
            .filter(|r| r.verdict == ReviewVerdict::ChangesRequested)
            .count() as u32;
        let mut state = CycleState::new(cycle_id, prior);

        let fetched = with_retry(&self.config.retry, "platform.fetch_change_request", || {
            self.collaborators.platform.fetch_change_request(id)
        })
        .await;
        let mut change = match fetched {
            Ok(remote) => fresh(remote, id, max_iterations)?.with_completed_iterations(completed),
            Err(err) => {
                let escalation = escalation_for(&err).ok_or(err)?;
                let change = ChangeRequest::new(id.clone(), "", "")
                    .with_max_iterations(max_iterations)?
                    .with_completed_iterations(completed);
                return self.escalate(change, escalation, &state, started).await;
            }
        };

        obs::emit_cycle_started(id.as_str(), change.max_iterations());
        change.transition_to(ChangeStatus::AwaitingCi)?;

        loop {
            match self.pass(&mut change, &mut state).await {
                Ok(PassOutcome::Revised) => continue,
                Ok(PassOutcome::Approved { iteration }) => {
                    return self.approve(change, iteration, &state, started).await;
                }
                Ok(PassOutcome::Escalate(escalation)) => {
                    return self.escalate(change, escalation, &state, started).await;
                }
                Err(err) => {
                    let escalation = escalation_for(&err).ok_or(err)?;
                    return self.escalate(change, escalation, &state, started).await;
                }
            }
        }
    }

    /// One CI -> conflicts -> review pass.
    async fn pass(
        &self,
        change: &mut ChangeRequest,
        state: &mut CycleState,
    ) -> GateResult<PassOutcome> {
        self.checkpoint(ChangeStatus::AwaitingCi)?;
        obs::emit_stage_entered(change.id.as_str(), change.status(), change.iteration_count());
        let mut evidence = self.gather_evidence(change).await?;
        let mut run = self
            .monitor
            .await_completion(change, self.config.ci_timeout())
            .await?;
        self.monitor.triage(change, &mut run, &evidence.changed_files);
        let follow_ups = self.file_follow_ups(change, &run, state).await?;
        let ci = CiSummary::from_run(&run, follow_ups);

        if run.has_in_scope_failures() {
            let findings = FindingSnapshot::new(ci_findings(&run));
            return self
                .request_changes(
                    change,
                    state,
                    findings,
                    ConflictSummary::not_evaluated(),
                    ci,
                    EscalationReason::CiFailure,
                )
                .await;
        }

        self.checkpoint(ChangeStatus::ResolvingConflicts)?;
        change.transition_to(ChangeStatus::ResolvingConflicts)?;
        obs::emit_stage_entered(change.id.as_str(), change.status(), change.iteration_count());
        let conflicts = match self.resolve_conflicts(change).await? {
            Ok(summary) => summary,
            Err(escalation) => return Ok(PassOutcome::Escalate(escalation)),
        };
        if conflicts.outcome == ConflictOutcome::AutoResolved {
            // The resolution commit moved the head; review what will merge.
            self.refresh_head(change).await?;
            evidence = self.gather_evidence(change).await?;
        }

        self.checkpoint(ChangeStatus::UnderReview)?;
        change.transition_to(ChangeStatus::UnderReview)?;
        obs::emit_stage_entered(change.id.as_str(), change.status(), change.iteration_count());
        let work_item = self.linked_work_item(change).await?;
        let findings = FindingSnapshot::new(
            self.reviewer
                .review(change, work_item.as_ref(), &evidence)
                .await?,
        );

        match findings.verdict() {
            ReviewVerdict::Approved => {
                let iteration = change.iteration_count() + 1;
                let record = IterationRecord::new(iteration, findings, conflicts, ci)
                    .with_revision(change.revision.clone());
                self.record(change, state, record).await?;
                change.transition_to(ChangeStatus::Approved)?;
                Ok(PassOutcome::Approved { iteration })
            }
            ReviewVerdict::ChangesRequested => {
                self.request_changes(
                    change,
                    state,
                    findings,
                    conflicts,
                    ci,
                    EscalationReason::IterationLimit,
                )
                .await
            }
        }
    }

    /// Detect and, when every region is simple, resolve conflicts.
    ///
    /// This unit is never interrupted by cancellation. The inner `Err`
    /// carries a complex-conflict escalation.
    async fn resolve_conflicts(
        &self,
        change: &ChangeRequest,
    ) -> GateResult<Result<ConflictSummary, Escalation>> {
        let set = match self
            .detector
            .detect(&change.source_ref, &change.target_ref)
            .await?
        {
            Detection::NoConflicts => return Ok(Ok(ConflictSummary::none())),
            Detection::Conflicts(set) => set,
        };
        for region in &set.regions {
            obs::emit_conflict_classified(change.id.as_str(), region.path(), region.category());
        }

        match self.resolver.resolve(&set).await? {
            ResolveOutcome::Resolved(merge) => {
                METRICS.inc_conflicts_auto_resolved();
                obs::emit_conflicts_resolved(change.id.as_str(), merge.applied.len(), &merge.commit);
                if !merge.regenerate.is_empty() {
                    let body = format!(
                        "Merge conflicts were resolved automatically in `{}`. Regenerate these lock files: {}",
                        merge.commit,
                        merge
                            .regenerate
                            .iter()
                            .map(|p| format!("`{p}`"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    self.notify(change, "platform.post_comment", || {
                        self.collaborators.platform.post_comment(&change.id, &body)
                    })
                    .await;
                }
                Ok(Ok(ConflictSummary {
                    outcome: ConflictOutcome::AutoResolved,
                    regions: merge.applied,
                    regenerate: merge.regenerate,
                    resolution_commit: Some(merge.commit),
                }))
            }
            ResolveOutcome::PartialEscalation {
                resolved,
                unresolved,
            } => Ok(Err(Escalation {
                reason: EscalationReason::ComplexConflict,
                detail: GateError::ComplexConflict {
                    regions: unresolved.len(),
                }
                .to_string(),
                unresolved,
                resolvable: resolved,
            })),
        }
    }

    /// Consume one iteration and hand the findings to the implementer, or
    /// escalate with `exhausted` when the budget is spent.
    async fn request_changes(
        &self,
        change: &mut ChangeRequest,
        state: &mut CycleState,
        findings: FindingSnapshot,
        conflicts: ConflictSummary,
        ci: CiSummary,
        exhausted: EscalationReason,
    ) -> GateResult<PassOutcome> {
        if !change.has_iterations_left() {
            return Ok(PassOutcome::Escalate(Escalation::new(
                exhausted,
                format!(
                    "{} finding(s) still open after {} iteration(s)",
                    findings.len(),
                    change.iteration_count()
                ),
            )));
        }

        change.transition_to(ChangeStatus::ChangesRequested)?;
        let iteration = change.iteration_count();
        let record = IterationRecord::new(iteration, findings.clone(), conflicts, ci)
            .with_revision(change.revision.clone());
        self.record(change, state, record).await?;

        let comment = render_findings(iteration, change.max_iterations(), &findings);
        self.notify(change, "platform.post_comment", || {
            self.collaborators.platform.post_comment(&change.id, &comment)
        })
        .await;
        self.notify(change, "platform.set_verdict", || {
            self.collaborators
                .platform
                .set_verdict(&change.id, PlatformVerdict::RequestChanges)
        })
        .await;

        let current: &ChangeRequest = change;
        with_retry(&self.config.retry, "implementer.request_fixes", || {
            self.collaborators.implementer.request_fixes(current, &findings)
        })
        .await?;
        change.transition_to(ChangeStatus::AwaitingFix)?;
        obs::emit_stage_entered(change.id.as_str(), change.status(), change.iteration_count());

        self.checkpoint(ChangeStatus::AwaitingFix)?;
        let current: &ChangeRequest = change;
        let revision = with_retry(&self.config.retry, "implementer.await_revision", || {
            self.collaborators.implementer.await_revision(current)
        })
        .await?;
        change.revision = Some(revision);
        change.transition_to(ChangeStatus::AwaitingCi)?;
        Ok(PassOutcome::Revised)
    }

    async fn refresh_head(&self, change: &mut ChangeRequest) -> GateResult<()> {
        let id = change.id.clone();
        let head = with_retry(&self.config.retry, "platform.fetch_change_request", || {
            self.collaborators.platform.fetch_change_request(&id)
        })
        .await?;
        change.revision = head.revision;
        Ok(())
    }

    async fn gather_evidence(&self, change: &ChangeRequest) -> GateResult<ChangeEvidence> {
        let platform = &self.collaborators.platform;
        let retry = &self.config.retry;
        let changed_files = with_retry(retry, "platform.list_changed_files", || {
            platform.list_changed_files(&change.id)
        })
        .await?;
        let raw = with_retry(retry, "platform.get_diff", || platform.get_diff(&change.id)).await?;
        let commits =
            with_retry(retry, "platform.list_commits", || platform.list_commits(&change.id)).await?;
        Ok(ChangeEvidence {
            changed_files,
            diff: parse_unified_diff(&raw)?,
            commits,
        })
    }

    async fn linked_work_item(&self, change: &ChangeRequest) -> GateResult<Option<WorkItem>> {
        let Some(item_id) = change.work_item.as_deref() else {
            return Ok(None);
        };
        with_retry(&self.config.retry, "tracker.fetch_linked_item", || {
            self.collaborators.tracker.fetch_linked_item(item_id)
        })
        .await
    }

    /// File one follow-up per out-of-scope failure not already followed up
    /// in this cycle. Returns the new work item ids.
    async fn file_follow_ups(
        &self,
        change: &ChangeRequest,
        run: &CiRun,
        state: &mut CycleState,
    ) -> GateResult<Vec<String>> {
        let mut filed = Vec::new();
        for triage in run.out_of_scope() {
            if state.followed_up.contains(&triage.check) {
                continue;
            }
            let Some(check) = run.checks.iter().find(|c| c.name == triage.check) else {
                continue;
            };
            let follow_up = follow_up_for(check, change, self.config.project.as_deref());
            let item = with_retry(&self.config.retry, "tracker.create_follow_up", || {
                self.collaborators.tracker.create_follow_up(&follow_up)
            })
            .await?;
            obs::emit_follow_up_filed(change.id.as_str(), &check.name, &item);
            METRICS.inc_follow_ups_filed();
            state.followed_up.insert(triage.check.clone());
            filed.push(item);
        }
        Ok(filed)
    }

    async fn record(
        &self,
        change: &ChangeRequest,
        state: &mut CycleState,
        record: IterationRecord,
    ) -> GateResult<()> {
        let key = change.id.as_str();
        let seq = self.ledger.next_seq(key).await?;
        let payload = serde_json::to_value(&record)?;
        self.ledger
            .append(key, AuditEntry::new(seq, ITERATION_ENTRY_KIND, payload))
            .await?;
        obs::emit_iteration_recorded(key, record.iteration, record.verdict, record.findings.len());
        METRICS.inc_iterations_recorded();
        state.history.push(record);
        Ok(())
    }

    async fn approve(
        &self,
        change: ChangeRequest,
        iteration: u32,
        state: &CycleState,
        started: Instant,
    ) -> GateResult<TerminalVerdict> {
        let body = format!(
            "Approved: CI, merge and review gates passed on iteration {iteration}."
        );
        self.notify(&change, "platform.post_comment", || {
            self.collaborators.platform.post_comment(&change.id, &body)
        })
        .await;
        self.notify(&change, "platform.set_verdict", || {
            self.collaborators
                .platform
                .set_verdict(&change.id, PlatformVerdict::Approve)
        })
        .await;
        let verdict = TerminalVerdict::Approved {
            change_request: change.id.clone(),
            iteration,
            iteration_count: change.iteration_count(),
        };
        self.finish(&change, verdict, state, started).await
    }

    async fn escalate(
        &self,
        mut change: ChangeRequest,
        escalation: Escalation,
        state: &CycleState,
        started: Instant,
    ) -> GateResult<TerminalVerdict> {
        change.transition_to(ChangeStatus::Escalated)?;
        let report = ReportBuilder::new(&change, escalation.reason, escalation.detail)
            .conflicts(&escalation.unresolved, &escalation.resolvable)
            .history(state.history.clone())
            .build();
        obs::emit_escalated(change.id.as_str(), report.reason, change.iteration_count());
        METRICS.inc_escalations();

        self.notify(&change, "platform.post_comment", || {
            self.collaborators
                .platform
                .post_comment(&change.id, &report.markdown)
        })
        .await;
        let label = self.config.escalation_label.as_str();
        self.notify(&change, "platform.add_label", || {
            self.collaborators.platform.add_label(&change.id, label)
        })
        .await;
        self.notify(&change, "platform.set_verdict", || {
            self.collaborators
                .platform
                .set_verdict(&change.id, PlatformVerdict::RequestChanges)
        })
        .await;
        if let Some(item) = change.work_item.as_deref() {
            let note = format!(
                "Change request {} was escalated for human review: {}",
                change.id,
                report.reason.title()
            );
            self.notify(&change, "tracker.post_comment", || {
                self.collaborators.tracker.post_comment(item, &note)
            })
            .await;
        }

        self.finish(&change, TerminalVerdict::Escalated(report), state, started)
            .await
    }

    /// Append the verdict and seal the trail.
    async fn finish(
        &self,
        change: &ChangeRequest,
        verdict: TerminalVerdict,
        state: &CycleState,
        started: Instant,
    ) -> GateResult<TerminalVerdict> {
        let key = change.id.as_str();
        let seq = self.ledger.next_seq(key).await?;
        let payload = json!({
            "verdict": verdict.status_str(),
            "reason": verdict.escalation().map(|r| r.reason),
            "iteration_count": change.iteration_count(),
            "cycle_id": state.cycle_id,
        });
        self.ledger
            .append(key, AuditEntry::new(seq, VERDICT_ENTRY_KIND, payload))
            .await?;
        self.ledger.archive(key, verdict.status_str()).await?;
        METRICS.inc_cycles_completed();
        obs::emit_cycle_finished(key, verdict.status_str(), started.elapsed().as_millis() as u64);
        Ok(verdict)
    }

    /// Best-effort side effect: retried, logged on failure, never fatal.
    async fn notify<F, Fut>(&self, change: &ChangeRequest, operation: &str, op: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = GateResult<()>>,
    {
        if let Err(err) = with_retry(&self.config.retry, operation, op).await {
            obs::emit_side_effect_error(change.id.as_str(), operation, &err);
        }
    }

    fn checkpoint(&self, stage: ChangeStatus) -> GateResult<()> {
        if self.cancel.is_cancelled() {
            return Err(GateError::Cancelled {
                stage: stage.to_string(),
            });
        }
        Ok(())
    }
}

/// Start every cycle from `Created`, whatever status the platform reports.
fn fresh(
    remote: ChangeRequest,
    id: &ChangeRequestId,
    max_iterations: u32,
) -> GateResult<ChangeRequest> {
    let mut change = ChangeRequest::new(id.clone(), remote.source_ref, remote.target_ref)
        .with_max_iterations(max_iterations)?;
    change.work_item = remote.work_item;
    change.revision = remote.revision;
    Ok(change)
}

/// Iteration records stored in `ledger` for `id`, oldest first.
pub async fn read_audit_trail(
    ledger: &dyn AuditLedger,
    id: &ChangeRequestId,
) -> GateResult<Vec<IterationRecord>> {
    ledger
        .entries(id.as_str())
        .await?
        .into_iter()
        .filter(|entry| entry.kind == ITERATION_ENTRY_KIND)
        .map(|entry| serde_json::from_value(entry.payload).map_err(GateError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Check, CheckStatus, CheckTriage, Triage};

    #[test]
    fn test_escalation_mapping() {
        let infra = GateError::TransientInfra {
            operation: "ci.get_checks".into(),
            attempts: 4,
            detail: "reset".into(),
        };
        assert_eq!(
            escalation_for(&infra).map(|e| e.reason),
            Some(EscalationReason::Infrastructure)
        );
        let timeout = GateError::CiTimeout {
            change_request: "pr-1".into(),
            waited_secs: 60,
        };
        assert_eq!(
            escalation_for(&timeout).map(|e| e.reason),
            Some(EscalationReason::CiTimeout)
        );
        assert!(escalation_for(&GateError::Cancelled { stage: "x".into() }).is_none());
        assert!(escalation_for(&GateError::LockHeld {
            change_request: "pr-1".into()
        })
        .is_none());
    }

    #[test]
    fn test_ci_findings_are_blocking_and_located() {
        let mut run = CiRun::from_checks(vec![Check::new("unit", CheckStatus::Failure)]);
        run.triage = vec![CheckTriage {
            check: "unit".into(),
            triage: Triage::InScope,
            referenced_files: vec!["src/a.rs".into()],
        }];
        let findings = ci_findings(&run);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].dimension, Dimension::ContinuousIntegration);
        assert_eq!(findings[0].file.as_deref(), Some("src/a.rs"));
    }

    #[test]
    fn test_cancellation_handle_is_shared() {
        let handle = CancellationHandle::default();
        let clone = handle.clone();
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }
}
