//! Conflict pipeline: trial merge, classification and auto-resolution.

pub mod classifier;
pub mod detector;
pub mod markers;
pub mod resolver;

pub use classifier::{is_import_block, ConflictClassifier, ImportLanguage};
pub use detector::{extract_hunks, ConflictDetector, ConflictSet, Detection};
pub use markers::{split_conflicts, take_theirs, MarkerError, Segment};
pub use resolver::{plan_resolutions, ConflictResolver, ResolveOutcome, ResolvedMerge};
