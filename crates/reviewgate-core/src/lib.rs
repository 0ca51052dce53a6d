//! reviewgate core library
//!
//! Moves a change request through CI triage, merge-conflict resolution and a
//! four-dimension quality review in bounded iterations, ending in approval or
//! a structured escalation.
//!
//! ## Key Components
//!
//! - [`CiMonitor`]: polls CI and triages failures against the change
//! - [`ConflictDetector`] / [`ConflictResolver`]: trial merge, classification
//!   and all-or-nothing auto-resolution
//! - [`QualityReviewer`]: spec adherence, code quality, test coverage and
//!   commit format findings
//! - [`ReviewCycleCoordinator`]: the state machine, audit trail and escalation

pub mod ci_monitor;
pub mod collaborators;
pub mod config;
pub mod conflict;
pub mod coordinator;
pub mod diff;
pub mod domain;
pub mod fakes;
pub mod git;
pub mod lock;
pub mod metrics;
pub mod obs;
pub mod report;
pub mod retry;
pub mod review;
pub mod telemetry;

pub use ci_monitor::{classify_failure, follow_up_for, CiMonitor};
pub use collaborators::{
    ChangeImplementer, CommitInfo, ConflictedFile, ContinuousIntegrationService, Diagnostic,
    DiagnosticLevel, FileResolution, FollowUp, FsRepoPaths, MergeWorkspace, PlatformVerdict,
    RepoPaths, ResolutionAction, StaticAnalysisTool, TrialMerge, VersionControlPlatform,
    WorkItem, WorkItemTracker,
};
pub use config::GateConfig;
pub use conflict::{
    ConflictClassifier, ConflictDetector, ConflictResolver, ConflictSet, Detection,
    ResolveOutcome, ResolvedMerge,
};
pub use coordinator::{
    read_audit_trail, CancellationHandle, Collaborators, ReviewCycleCoordinator,
    VERDICT_ENTRY_KIND,
};
pub use diff::{parse_unified_diff, FileDiff};
pub use domain::*;
pub use git::{capture_head_sha, is_git_repo, GitMergeWorkspace};
pub use lock::{CycleLock, LockRegistry};
pub use metrics::METRICS;
pub use obs::CycleSpan;
pub use report::{recurring_patterns, render_markdown, ReportBuilder};
pub use retry::{with_retry, RetryPolicy};
pub use review::{ChangeEvidence, CommitFormat, QualityReviewer};
pub use telemetry::init_tracing;

pub use reviewgate_state::fakes::MemoryAuditLedger;
pub use reviewgate_state::{AuditLedger, FsAuditLedger};

/// reviewgate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
