//! Conflict regions, categories and the fixed resolution policy table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category assigned to a conflicting hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    WhitespaceOnly,
    ImportOrdering,
    LockfileRegen,
    DeletedVsModified,
    SemanticOverlap,
    Unknown,
}

/// Deterministic strategy applied to a simple region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Take the target branch's side verbatim.
    AcceptTarget,
    /// Take the target branch's side and flag the lock artifact for regeneration.
    AcceptTargetAndRegenerate,
}

impl ConflictCategory {
    /// Policy table: which categories resolve without a human.
    pub fn is_simple(self) -> bool {
        matches!(
            self,
            ConflictCategory::WhitespaceOnly
                | ConflictCategory::ImportOrdering
                | ConflictCategory::LockfileRegen
        )
    }

    /// Strategy for simple categories; `None` for complex ones.
    pub fn strategy(self) -> Option<ResolutionStrategy> {
        match self {
            ConflictCategory::WhitespaceOnly | ConflictCategory::ImportOrdering => {
                Some(ResolutionStrategy::AcceptTarget)
            }
            ConflictCategory::LockfileRegen => Some(ResolutionStrategy::AcceptTargetAndRegenerate),
            ConflictCategory::DeletedVsModified
            | ConflictCategory::SemanticOverlap
            | ConflictCategory::Unknown => None,
        }
    }

    /// What a human should do with a region of this category.
    pub fn guidance(self) -> &'static str {
        match self {
            ConflictCategory::WhitespaceOnly => {
                "Formatting-only difference; the target branch's formatting was kept."
            }
            ConflictCategory::ImportOrdering => {
                "Import/include lines differ only in ordering or grouping; the target branch's block was kept. Re-add any import the change still needs."
            }
            ConflictCategory::LockfileRegen => {
                "Generated lock artifact; the target branch's version was kept. Regenerate it with the package manager after merging."
            }
            ConflictCategory::DeletedVsModified => {
                "One branch deleted this file while the other modified it. Decide whether the file should survive; if it does, re-apply the modifications on top of the surviving version."
            }
            ConflictCategory::SemanticOverlap => {
                "Both branches changed the same logic. Read both sides, combine the intent of each change by hand, and re-run the tests that cover this code."
            }
            ConflictCategory::Unknown => {
                "The conflict could not be classified (binary content or unparseable markers). Inspect the file manually and resolve it with the merge tool of your choice."
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConflictCategory::WhitespaceOnly => "whitespace_only",
            ConflictCategory::ImportOrdering => "import_ordering",
            ConflictCategory::LockfileRegen => "lockfile_regen",
            ConflictCategory::DeletedVsModified => "deleted_vs_modified",
            ConflictCategory::SemanticOverlap => "semantic_overlap",
            ConflictCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConflictCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a raw hunk was obtained from the trial merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HunkOrigin {
    /// Parsed from three-way conflict markers.
    Markers,
    /// File-level conflict where one side has no content for the file.
    Deletion,
    /// File is conflicted but no markers could be parsed.
    Unparsed,
}

/// An unclassified conflicting hunk. `ours` is the source branch (the change),
/// `theirs` the target branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictHunk {
    pub path: String,
    /// Source-branch side; `None` when the source deleted the file.
    pub ours: Option<String>,
    /// Target-branch side; `None` when the target deleted the file.
    pub theirs: Option<String>,
    /// Common ancestor side (diff3 markers only).
    pub base: Option<String>,
    pub origin: HunkOrigin,
}

/// A classified conflicting hunk.
///
/// Only the classifier constructs these, so the category is fixed for the
/// lifetime of one detection pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRegion {
    hunk: ConflictHunk,
    category: ConflictCategory,
    strategy: Option<ResolutionStrategy>,
}

impl ConflictRegion {
    pub(crate) fn classified(hunk: ConflictHunk, category: ConflictCategory) -> Self {
        Self {
            hunk,
            category,
            strategy: category.strategy(),
        }
    }

    pub fn path(&self) -> &str {
        &self.hunk.path
    }

    pub fn hunk(&self) -> &ConflictHunk {
        &self.hunk
    }

    /// Source-branch content, empty when deleted.
    pub fn ours(&self) -> &str {
        self.hunk.ours.as_deref().unwrap_or("")
    }

    /// Target-branch content, empty when deleted.
    pub fn theirs(&self) -> &str {
        self.hunk.theirs.as_deref().unwrap_or("")
    }

    pub fn category(&self) -> ConflictCategory {
        self.category
    }

    pub fn strategy(&self) -> Option<ResolutionStrategy> {
        self.strategy
    }

    pub fn is_simple(&self) -> bool {
        self.category.is_simple()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConflictCategory; 6] = [
        ConflictCategory::WhitespaceOnly,
        ConflictCategory::ImportOrdering,
        ConflictCategory::LockfileRegen,
        ConflictCategory::DeletedVsModified,
        ConflictCategory::SemanticOverlap,
        ConflictCategory::Unknown,
    ];

    #[test]
    fn test_policy_table_simple_categories_have_strategies() {
        for category in ALL {
            assert_eq!(category.is_simple(), category.strategy().is_some());
            assert!(!category.guidance().is_empty());
        }
        assert_eq!(
            ConflictCategory::LockfileRegen.strategy(),
            Some(ResolutionStrategy::AcceptTargetAndRegenerate)
        );
    }

    #[test]
    fn test_unknown_is_never_simple() {
        assert!(!ConflictCategory::Unknown.is_simple());
        assert!(!ConflictCategory::DeletedVsModified.is_simple());
        assert!(!ConflictCategory::SemanticOverlap.is_simple());
    }

    #[test]
    fn test_region_strategy_follows_category() {
        let hunk = ConflictHunk {
            path: "a.rs".into(),
            ours: Some("a".into()),
            theirs: None,
            base: None,
            origin: HunkOrigin::Deletion,
        };
        let region = ConflictRegion::classified(hunk, ConflictCategory::DeletedVsModified);
        assert_eq!(region.strategy(), None);
        assert_eq!(region.theirs(), "");
        assert_eq!(region.ours(), "a");
    }
}
