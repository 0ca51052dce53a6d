//! External collaborators the review cycle drives.
//!
//! Concrete bindings (platform APIs, CI services, trackers) live outside this
//! crate; in-memory implementations live in [`crate::fakes`]. Implementations
//! report retryable network faults as [`GateError::Transient`] and everything
//! else as [`GateError::Collaborator`].
//!
//! [`GateError::Transient`]: crate::domain::GateError::Transient
//! [`GateError::Collaborator`]: crate::domain::GateError::Collaborator

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ChangeRequest, ChangeRequestId, Check, FindingSnapshot, GateResult};

// ----- Version-control platform -----

/// A commit belonging to a change request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    /// Full commit message; the first line is the subject.
    pub message: String,
    #[serde(default)]
    pub is_merge: bool,
}

impl CommitInfo {
    pub fn new(sha: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            is_merge: false,
        }
    }

    pub fn merge(mut self) -> Self {
        self.is_merge = true;
        self
    }

    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn short_sha(&self) -> &str {
        self.sha.get(..8).unwrap_or(&self.sha)
    }
}

/// Review decision recorded on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformVerdict {
    Approve,
    RequestChanges,
}

impl fmt::Display for PlatformVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformVerdict::Approve => f.write_str("approve"),
            PlatformVerdict::RequestChanges => f.write_str("request_changes"),
        }
    }
}

#[async_trait]
pub trait VersionControlPlatform: Send + Sync {
    async fn fetch_change_request(&self, id: &ChangeRequestId) -> GateResult<ChangeRequest>;

    async fn list_changed_files(&self, id: &ChangeRequestId) -> GateResult<Vec<String>>;

    /// Unified diff of the change against its target.
    async fn get_diff(&self, id: &ChangeRequestId) -> GateResult<String>;

    async fn list_commits(&self, id: &ChangeRequestId) -> GateResult<Vec<CommitInfo>>;

    async fn post_comment(&self, id: &ChangeRequestId, body: &str) -> GateResult<()>;

    async fn set_verdict(&self, id: &ChangeRequestId, verdict: PlatformVerdict) -> GateResult<()>;

    async fn add_label(&self, id: &ChangeRequestId, label: &str) -> GateResult<()>;
}

// ----- Merge workspace -----

/// One file left conflicted by a trial merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictedFile {
    pub path: String,
    /// Source-branch version; `None` when the source deleted the file.
    pub ours: Option<String>,
    /// Target-branch version; `None` when the target deleted the file.
    pub theirs: Option<String>,
    /// Working-tree content with conflict markers, when git wrote any.
    pub merged: Option<String>,
    /// Any side contained non-UTF-8 or NUL bytes.
    #[serde(default)]
    pub binary: bool,
}

/// Result of a trial merge. The workspace has already been rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "files", rename_all = "snake_case")]
pub enum TrialMerge {
    Clean,
    Conflicted(Vec<ConflictedFile>),
}

/// How one conflicted file is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "content", rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Write this text (merged content with every conflict settled).
    Write(String),
    /// Take the target branch's file wholesale, deleting it if the target did.
    TakeTheirs,
}

/// Resolution for one conflicted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResolution {
    pub path: String,
    pub action: ResolutionAction,
}

/// Exclusive access to the change request's branch for merges.
///
/// `trial_merge` must leave every ref and working tree exactly as it found
/// them on all exit paths. `commit_resolution` re-runs the merge, writes the
/// given resolutions, and records a single resolution commit on
/// `source_ref`; it changes nothing if any step fails.
#[async_trait]
pub trait MergeWorkspace: Send + Sync {
    async fn trial_merge(&self, source_ref: &str, target_ref: &str) -> GateResult<TrialMerge>;

    /// Returns the id of the resolution commit.
    async fn commit_resolution(
        &self,
        source_ref: &str,
        target_ref: &str,
        resolutions: &[FileResolution],
    ) -> GateResult<String>;
}

// ----- CI -----

#[async_trait]
pub trait ContinuousIntegrationService: Send + Sync {
    async fn get_checks(&self, id: &ChangeRequestId) -> GateResult<Vec<Check>>;
}

// ----- Work items -----

/// A work item on the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Follow-up work item request for a failure the change did not cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUp {
    pub title: String,
    pub body: String,
    pub project: Option<String>,
}

#[async_trait]
pub trait WorkItemTracker: Send + Sync {
    async fn fetch_linked_item(&self, id: &str) -> GateResult<Option<WorkItem>>;

    async fn post_comment(&self, id: &str, body: &str) -> GateResult<()>;

    /// Returns the new work item's id.
    async fn create_follow_up(&self, follow_up: &FollowUp) -> GateResult<String>;
}

// ----- Static analysis -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// One structured diagnostic from a linter or test runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: Option<u32>,
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

#[async_trait]
pub trait StaticAnalysisTool: Send + Sync {
    /// Analyze one changed file.
    async fn analyze(&self, path: &str) -> GateResult<Vec<Diagnostic>>;
}

// ----- Change implementer -----

#[async_trait]
pub trait ChangeImplementer: Send + Sync {
    /// Hand the findings to whoever produces the next revision.
    async fn request_fixes(&self, change: &ChangeRequest, findings: &FindingSnapshot)
        -> GateResult<()>;

    /// Wait for a new revision of the change; returns its revision id.
    async fn await_revision(&self, change: &ChangeRequest) -> GateResult<String>;
}

// ----- Repository paths -----

/// Answers whether a repository-relative path exists.
pub trait RepoPaths: Send + Sync {
    fn exists(&self, path: &str) -> bool;
}

/// [`RepoPaths`] over a checked-out repository.
#[derive(Debug, Clone)]
pub struct FsRepoPaths {
    root: PathBuf,
}

impl FsRepoPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl RepoPaths for FsRepoPaths {
    fn exists(&self, path: &str) -> bool {
        self.root.join(path).exists()
    }
}
