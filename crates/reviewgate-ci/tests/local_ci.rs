//! Integration tests for local checks feeding CI triage.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reviewgate_ci::{CheckConfig, LocalCiService};
use reviewgate_core::fakes::{
    FakeAnalyzer, FakeImplementer, FakeMergeWorkspace, FakePlatform, FakeRepoPaths, FakeRevision,
    FakeTracker,
};
use reviewgate_core::{
    ChangeImplementer, ChangeRequest, CiMonitor, CiStatus, Collaborators, CommitInfo,
    FindingSnapshot, GateConfig, GateResult, MemoryAuditLedger, RetryPolicy,
    ReviewCycleCoordinator, TerminalVerdict, Triage,
};

fn sh(name: &str, script: &str) -> CheckConfig {
    CheckConfig::custom(name, vec!["sh".into(), "-c".into(), script.into()], 30)
}

fn monitor(service: LocalCiService) -> CiMonitor {
    CiMonitor::new(Arc::new(service), RetryPolicy::none(), Duration::from_secs(1))
}

/// Test: a failure whose output names a changed file is in scope
#[tokio::test]
async fn test_failure_in_changed_file_is_in_scope() {
    let dir = tempfile::tempdir().unwrap();
    let service = LocalCiService::new(
        dir.path(),
        vec![
            sh("fmt", "true"),
            sh(
                "unit",
                "echo 'thread main panicked at src/retry.rs:14:9' >&2; exit 101",
            ),
        ],
    );
    let monitor = monitor(service);
    let change = ChangeRequest::new("pr-1", "feature/retry", "main");

    let mut run = monitor
        .await_completion(&change, Duration::from_secs(60))
        .await
        .expect("checks complete");
    assert_eq!(run.status, CiStatus::Failure);

    monitor.triage(&change, &mut run, &["src/retry.rs".to_string()]);
    assert_eq!(run.triage.len(), 1);
    assert_eq!(run.triage[0].check, "unit");
    assert_eq!(run.triage[0].triage, Triage::InScope);
    assert!(run.has_in_scope_failures());
}

/// Test: a failure in untouched code is out of scope
#[tokio::test]
async fn test_failure_elsewhere_is_out_of_scope() {
    let dir = tempfile::tempdir().unwrap();
    let service = LocalCiService::new(
        dir.path(),
        vec![sh("e2e", "echo 'FAIL tests/e2e/login.spec.ts:30' ; exit 1")],
    );
    let monitor = monitor(service);
    let change = ChangeRequest::new("pr-2", "feature/retry", "main");

    let mut run = monitor
        .await_completion(&change, Duration::from_secs(60))
        .await
        .expect("checks complete");
    monitor.triage(&change, &mut run, &["src/retry.rs".to_string()]);
    assert_eq!(run.triage[0].triage, Triage::OutOfScope);
    assert!(!run.has_in_scope_failures());
}

/// Test: all checks passing yields a successful run
#[tokio::test]
async fn test_all_checks_pass() {
    let dir = tempfile::tempdir().unwrap();
    let service = LocalCiService::new(dir.path(), vec![sh("a", "true"), sh("b", "exit 0")]);
    let run = monitor(service)
        .await_completion(
            &ChangeRequest::new("pr-3", "feature/x", "main"),
            Duration::from_secs(60),
        )
        .await
        .expect("checks complete");
    assert_eq!(run.status, CiStatus::Success);
    assert!(run.triage.is_empty());
}

const DIFF: &str = "\
diff --git a/src/retry.rs b/src/retry.rs
--- a/src/retry.rs
+++ b/src/retry.rs
@@ -1,0 +1,1 @@
+pub fn retry_delay() {}
";

fn revision() -> FakeRevision {
    FakeRevision::new(
        &["src/retry.rs"],
        DIFF,
        vec![CommitInfo::new("1111111111", "feat(retry): add delay")],
    )
}

/// Writes the fix into the checked-out workspace, then hands out the next revision.
struct FixingImplementer {
    workdir: PathBuf,
    inner: FakeImplementer,
}

#[async_trait]
impl ChangeImplementer for FixingImplementer {
    async fn request_fixes(
        &self,
        change: &ChangeRequest,
        findings: &FindingSnapshot,
    ) -> GateResult<()> {
        std::fs::write(self.workdir.join("fixed"), "").unwrap();
        self.inner.request_fixes(change, findings).await
    }

    async fn await_revision(&self, change: &ChangeRequest) -> GateResult<String> {
        self.inner.await_revision(change).await
    }
}

/// Test: a fix landed in the workspace turns the next iteration green
#[tokio::test]
async fn test_fixed_workspace_passes_on_next_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let service = LocalCiService::new(
        dir.path(),
        vec![sh(
            "unit",
            "test -f fixed || { echo 'panicked at src/retry.rs:3:5' >&2; exit 101; }",
        )],
    );
    let change = ChangeRequest::new("pr-4", "feature/retry", "main");
    let id = change.id.clone();
    let platform = Arc::new(FakePlatform::new(change, "rev-1", revision()));
    platform.stage("rev-2", revision());
    let implementer = FixingImplementer {
        workdir: dir.path().to_path_buf(),
        inner: FakeImplementer::new(&["rev-2"]).linked(platform.clone()),
    };

    let collaborators = Collaborators {
        platform: platform.clone(),
        workspace: Arc::new(FakeMergeWorkspace::clean()),
        ci: Arc::new(service),
        tracker: Arc::new(FakeTracker::new()),
        analyzer: Arc::new(FakeAnalyzer::new()),
        implementer: Arc::new(implementer),
        repo_paths: Arc::new(FakeRepoPaths::with(["tests/retry.rs"])),
    };
    let config = GateConfig::default()
        .with_retry(RetryPolicy::none())
        .with_ci_poll_interval(Duration::from_secs(1))
        .with_ci_timeout(Duration::from_secs(60));
    let coordinator =
        ReviewCycleCoordinator::new(config, collaborators, Arc::new(MemoryAuditLedger::new()))
            .unwrap();

    let verdict = coordinator.run_cycle(&id).await.unwrap();
    assert!(
        matches!(verdict, TerminalVerdict::Approved { iteration: 2, .. }),
        "{verdict:?}"
    );
    let trail = coordinator.get_audit_trail(&id).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].ci.status, CiStatus::Failure);
    assert_eq!(trail[1].ci.status, CiStatus::Success);
}
