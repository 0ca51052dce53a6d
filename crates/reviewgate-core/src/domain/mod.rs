//! Domain models for reviewgate.
//!
//! Canonical definitions for the core entities:
//! - `ChangeRequest`: a reviewable change and its status machine
//! - `CiRun`: one CI evaluation with failure triage
//! - `ConflictRegion`: a classified conflicting hunk
//! - `ReviewFinding` / `FindingSnapshot`: reviewer observations
//! - `IterationRecord`: append-only audit entries
//! - `TerminalVerdict`: the outcome of a review cycle

pub mod change_request;
pub mod ci;
pub mod conflict;
pub mod error;
pub mod finding;
pub mod iteration;
pub mod verdict;

pub use change_request::{ChangeRequest, ChangeRequestId, ChangeStatus, DEFAULT_MAX_ITERATIONS};
pub use ci::{Check, CheckStatus, CheckTriage, CiRun, CiStatus, Triage};
pub use conflict::{
    ConflictCategory, ConflictHunk, ConflictRegion, HunkOrigin, ResolutionStrategy,
};
pub use error::{GateError, GateResult};
pub use finding::{
    derive_verdict, Dimension, FindingSnapshot, ReviewFinding, ReviewVerdict, Severity,
};
pub use iteration::{
    CiSummary, ConflictOutcome, ConflictSummary, IterationRecord, RegionSummary,
    ITERATION_ENTRY_KIND,
};
pub use verdict::{
    EscalatedRegion, EscalationReason, EscalationReport, RecurringPattern, TerminalVerdict,
};
