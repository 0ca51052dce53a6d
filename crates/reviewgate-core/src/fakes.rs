//! In-memory collaborators (testing only)
//!
//! Each fake records the calls it receives so tests can assert on side
//! effects. `fail_next(n)` makes the next `n` calls fail with a transient
//! fault.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::collaborators::*;
use crate::coordinator::CancellationHandle;
use crate::domain::{
    ChangeRequest, ChangeRequestId, Check, FindingSnapshot, GateError, GateResult,
};

fn take_failure(counter: &AtomicU32, operation: &str) -> GateResult<()> {
    let remaining = counter.load(Ordering::SeqCst);
    if remaining > 0 {
        counter.store(remaining - 1, Ordering::SeqCst);
        return Err(GateError::transient(operation, "injected fault"));
    }
    Ok(())
}

// ----- CI -----

/// Scripted CI: queued poll results first, then the default check list.
#[derive(Debug, Default)]
pub struct FakeCi {
    polls: Mutex<VecDeque<Vec<Check>>>,
    default: Mutex<Vec<Check>>,
    failures: AtomicU32,
    poll_count: AtomicU32,
}

impl FakeCi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_poll(&self, checks: Vec<Check>) {
        self.polls.lock().unwrap().push_back(checks);
    }

    pub fn set_default(&self, checks: Vec<Check>) {
        *self.default.lock().unwrap() = checks;
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Every `get_checks` call, including failed ones.
    pub fn poll_count(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContinuousIntegrationService for FakeCi {
    async fn get_checks(&self, _id: &ChangeRequestId) -> GateResult<Vec<Check>> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failures, "ci.get_checks")?;
        if let Some(checks) = self.polls.lock().unwrap().pop_front() {
            return Ok(checks);
        }
        Ok(self.default.lock().unwrap().clone())
    }
}

// ----- Merge workspace -----

/// Scripted merge workspace.
///
/// Trial merges return queued outcomes first, then the default. A successful
/// `commit_resolution` makes the default `Clean`, as the branch now contains
/// the target.
#[derive(Debug)]
pub struct FakeMergeWorkspace {
    queued: Mutex<VecDeque<TrialMerge>>,
    default: Mutex<TrialMerge>,
    trial_merges: AtomicU32,
    commits: Mutex<Vec<Vec<FileResolution>>>,
    failures: AtomicU32,
    /// Platform head to move to once a resolution is committed.
    advance: Mutex<Option<(Arc<FakePlatform>, String)>>,
}

impl FakeMergeWorkspace {
    fn with_default(default: TrialMerge) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            trial_merges: AtomicU32::new(0),
            commits: Mutex::new(Vec::new()),
            failures: AtomicU32::new(0),
            advance: Mutex::new(None),
        }
    }

    /// Advance `platform` to `revision` when a resolution is committed.
    pub fn advance_on_commit(&self, platform: Arc<FakePlatform>, revision: &str) {
        *self.advance.lock().unwrap() = Some((platform, revision.to_string()));
    }

    pub fn clean() -> Self {
        Self::with_default(TrialMerge::Clean)
    }

    pub fn conflicted(files: Vec<ConflictedFile>) -> Self {
        Self::with_default(TrialMerge::Conflicted(files))
    }

    pub fn push_trial(&self, outcome: TrialMerge) {
        self.queued.lock().unwrap().push_back(outcome);
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn trial_merges(&self) -> u32 {
        self.trial_merges.load(Ordering::SeqCst)
    }

    /// Resolution batches committed so far.
    pub fn commits(&self) -> Vec<Vec<FileResolution>> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl MergeWorkspace for FakeMergeWorkspace {
    async fn trial_merge(&self, _source_ref: &str, _target_ref: &str) -> GateResult<TrialMerge> {
        self.trial_merges.fetch_add(1, Ordering::SeqCst);
        take_failure(&self.failures, "merge.trial")?;
        if let Some(outcome) = self.queued.lock().unwrap().pop_front() {
            return Ok(outcome);
        }
        Ok(self.default.lock().unwrap().clone())
    }

    async fn commit_resolution(
        &self,
        _source_ref: &str,
        _target_ref: &str,
        resolutions: &[FileResolution],
    ) -> GateResult<String> {
        take_failure(&self.failures, "merge.commit")?;
        let mut commits = self.commits.lock().unwrap();
        commits.push(resolutions.to_vec());
        *self.default.lock().unwrap() = TrialMerge::Clean;
        if let Some((platform, revision)) = self.advance.lock().unwrap().as_ref() {
            platform.advance_to(revision);
        }
        Ok(format!("resolution-{}", commits.len()))
    }
}

// ----- Platform -----

/// Content of one revision served by [`FakePlatform`].
#[derive(Debug, Clone, Default)]
pub struct FakeRevision {
    pub changed_files: Vec<String>,
    pub diff: String,
    pub commits: Vec<CommitInfo>,
}

impl FakeRevision {
    pub fn new(changed_files: &[&str], diff: &str, commits: Vec<CommitInfo>) -> Self {
        Self {
            changed_files: changed_files.iter().map(|s| s.to_string()).collect(),
            diff: diff.to_string(),
            commits,
        }
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    revisions: HashMap<String, FakeRevision>,
    current: String,
    comments: Vec<String>,
    labels: Vec<String>,
    verdicts: Vec<PlatformVerdict>,
}

/// Platform hosting a single change request whose head can be advanced.
#[derive(Debug)]
pub struct FakePlatform {
    change: ChangeRequest,
    state: Mutex<PlatformState>,
    failures: AtomicU32,
}

impl FakePlatform {
    /// Serve `change` at revision `revision`.
    pub fn new(change: ChangeRequest, revision: &str, content: FakeRevision) -> Self {
        let mut state = PlatformState {
            current: revision.to_string(),
            ..Default::default()
        };
        state.revisions.insert(revision.to_string(), content);
        Self {
            change,
            state: Mutex::new(state),
            failures: AtomicU32::new(0),
        }
    }

    /// Make `revision` available without moving the head to it.
    pub fn stage(&self, revision: &str, content: FakeRevision) {
        self.state
            .lock()
            .unwrap()
            .revisions
            .insert(revision.to_string(), content);
    }

    pub fn advance_to(&self, revision: &str) {
        self.state.lock().unwrap().current = revision.to_string();
    }

    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn comments(&self) -> Vec<String> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.state.lock().unwrap().labels.clone()
    }

    pub fn verdicts(&self) -> Vec<PlatformVerdict> {
        self.state.lock().unwrap().verdicts.clone()
    }

    fn current(&self, operation: &str) -> GateResult<FakeRevision> {
        take_failure(&self.failures, operation)?;
        let state = self.state.lock().unwrap();
        state
            .revisions
            .get(&state.current)
            .cloned()
            .ok_or_else(|| GateError::collaborator("platform", format!("unknown revision {}", state.current)))
    }

    fn check_id(&self, id: &ChangeRequestId) -> GateResult<()> {
        if id == &self.change.id {
            Ok(())
        } else {
            Err(GateError::collaborator("platform", format!("no change request {id}")))
        }
    }
}

#[async_trait]
impl VersionControlPlatform for FakePlatform {
    async fn fetch_change_request(&self, id: &ChangeRequestId) -> GateResult<ChangeRequest> {
        self.check_id(id)?;
        take_failure(&self.failures, "platform.fetch_change_request")?;
        let current = self.state.lock().unwrap().current.clone();
        Ok(self.change.clone().with_revision(current))
    }

    async fn list_changed_files(&self, id: &ChangeRequestId) -> GateResult<Vec<String>> {
        self.check_id(id)?;
        Ok(self.current("platform.list_changed_files")?.changed_files)
    }

    async fn get_diff(&self, id: &ChangeRequestId) -> GateResult<String> {
        self.check_id(id)?;
        Ok(self.current("platform.get_diff")?.diff)
    }

    async fn list_commits(&self, id: &ChangeRequestId) -> GateResult<Vec<CommitInfo>> {
        self.check_id(id)?;
        Ok(self.current("platform.list_commits")?.commits)
    }

    async fn post_comment(&self, id: &ChangeRequestId, body: &str) -> GateResult<()> {
        self.check_id(id)?;
        take_failure(&self.failures, "platform.post_comment")?;
        self.state.lock().unwrap().comments.push(body.to_string());
        Ok(())
    }

    async fn set_verdict(&self, id: &ChangeRequestId, verdict: PlatformVerdict) -> GateResult<()> {
        self.check_id(id)?;
        take_failure(&self.failures, "platform.set_verdict")?;
        self.state.lock().unwrap().verdicts.push(verdict);
        Ok(())
    }

    async fn add_label(&self, id: &ChangeRequestId, label: &str) -> GateResult<()> {
        self.check_id(id)?;
        take_failure(&self.failures, "platform.add_label")?;
        self.state.lock().unwrap().labels.push(label.to_string());
        Ok(())
    }
}

// ----- Tracker -----

#[derive(Debug, Default)]
struct TrackerState {
    items: HashMap<String, WorkItem>,
    comments: Vec<(String, String)>,
    follow_ups: Vec<FollowUp>,
}

#[derive(Debug, Default)]
pub struct FakeTracker {
    state: Mutex<TrackerState>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, item: WorkItem) -> Self {
        self.state
            .lock()
            .unwrap()
            .items
            .insert(item.id.clone(), item);
        self
    }

    pub fn follow_ups(&self) -> Vec<FollowUp> {
        self.state.lock().unwrap().follow_ups.clone()
    }

    pub fn comments(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().comments.clone()
    }
}

#[async_trait]
impl WorkItemTracker for FakeTracker {
    async fn fetch_linked_item(&self, id: &str) -> GateResult<Option<WorkItem>> {
        Ok(self.state.lock().unwrap().items.get(id).cloned())
    }

    async fn post_comment(&self, id: &str, body: &str) -> GateResult<()> {
        self.state
            .lock()
            .unwrap()
            .comments
            .push((id.to_string(), body.to_string()));
        Ok(())
    }

    async fn create_follow_up(&self, follow_up: &FollowUp) -> GateResult<String> {
        let mut state = self.state.lock().unwrap();
        state.follow_ups.push(follow_up.clone());
        Ok(format!("FU-{}", state.follow_ups.len()))
    }
}

// ----- Static analysis -----

/// Returns the registered diagnostics whose `file` matches the analyzed path.
#[derive(Debug, Default)]
pub struct FakeAnalyzer {
    diagnostics: Mutex<Vec<Diagnostic>>,
    analyzed: Mutex<Vec<String>>,
}

impl FakeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, diagnostic: Diagnostic) {
        self.diagnostics.lock().unwrap().push(diagnostic);
    }

    pub fn clear(&self) {
        self.diagnostics.lock().unwrap().clear();
    }

    pub fn analyzed(&self) -> Vec<String> {
        self.analyzed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StaticAnalysisTool for FakeAnalyzer {
    async fn analyze(&self, path: &str) -> GateResult<Vec<Diagnostic>> {
        self.analyzed.lock().unwrap().push(path.to_string());
        Ok(self
            .diagnostics
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.file == path)
            .cloned()
            .collect())
    }
}

// ----- Implementer -----

/// Produces scripted revisions, advancing a linked [`FakePlatform`] to each.
#[derive(Debug, Default)]
pub struct FakeImplementer {
    platform: Option<Arc<FakePlatform>>,
    revisions: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<FindingSnapshot>>,
    cancel_on_request: Mutex<Option<CancellationHandle>>,
}

impl FakeImplementer {
    pub fn new(revisions: &[&str]) -> Self {
        Self {
            platform: None,
            revisions: Mutex::new(revisions.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            cancel_on_request: Mutex::new(None),
        }
    }

    /// Cancel through `handle` when the next fix request arrives.
    pub fn cancel_on_next_request(&self, handle: CancellationHandle) {
        *self.cancel_on_request.lock().unwrap() = Some(handle);
    }

    pub fn linked(mut self, platform: Arc<FakePlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Findings handed over with each fix request, in order.
    pub fn requests(&self) -> Vec<FindingSnapshot> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChangeImplementer for FakeImplementer {
    async fn request_fixes(
        &self,
        _change: &ChangeRequest,
        findings: &FindingSnapshot,
    ) -> GateResult<()> {
        self.requests.lock().unwrap().push(findings.clone());
        if let Some(handle) = self.cancel_on_request.lock().unwrap().take() {
            handle.cancel();
        }
        Ok(())
    }

    async fn await_revision(&self, _change: &ChangeRequest) -> GateResult<String> {
        let next = self.revisions.lock().unwrap().pop_front();
        let revision =
            next.ok_or_else(|| GateError::collaborator("implementer", "no further revision"))?;
        if let Some(platform) = &self.platform {
            platform.advance_to(&revision);
        }
        Ok(revision)
    }
}

// ----- Repository paths -----

#[derive(Debug, Default)]
pub struct FakeRepoPaths(HashSet<String>);

impl FakeRepoPaths {
    pub fn with<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        Self(paths.into_iter().map(str::to_string).collect())
    }
}

impl RepoPaths for FakeRepoPaths {
    fn exists(&self, path: &str) -> bool {
        self.0.contains(path)
    }
}
