//! All-or-nothing conflict auto-resolution.
//!
//! A batch is committed only when every region is simple. One complex
//! region anywhere means nothing is written: the trial merge was already
//! rolled back by the detector, and the resolver never touches the
//! workspace.

use std::sync::Arc;

use crate::collaborators::{FileResolution, MergeWorkspace, ResolutionAction};
use crate::domain::{
    ConflictCategory, ConflictRegion, GateError, GateResult, RegionSummary, ResolutionStrategy,
};

use super::detector::ConflictSet;
use super::markers::{split_conflicts, take_theirs};

/// A fully applied resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMerge {
    pub applied: Vec<RegionSummary>,
    /// Lock artifacts to regenerate downstream.
    pub regenerate: Vec<String>,
    /// The synthetic conflict-resolution commit.
    pub commit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved(ResolvedMerge),
    /// Nothing was committed. `resolved` lists the simple regions that would
    /// have been handled, `unresolved` every complex one.
    PartialEscalation {
        resolved: Vec<ConflictRegion>,
        unresolved: Vec<ConflictRegion>,
    },
}

pub struct ConflictResolver {
    workspace: Arc<dyn MergeWorkspace>,
}

impl ConflictResolver {
    pub fn new(workspace: Arc<dyn MergeWorkspace>) -> Self {
        Self { workspace }
    }

    pub async fn resolve(&self, set: &ConflictSet) -> GateResult<ResolveOutcome> {
        if !set.all_simple() {
            let (resolved, unresolved): (Vec<_>, Vec<_>) =
                set.regions.iter().cloned().partition(ConflictRegion::is_simple);
            return Ok(ResolveOutcome::PartialEscalation {
                resolved,
                unresolved,
            });
        }

        let resolutions = plan_resolutions(set)?;
        let commit = self
            .workspace
            .commit_resolution(&set.source_ref, &set.target_ref, &resolutions)
            .await?;

        let mut regenerate: Vec<String> = set
            .regions
            .iter()
            .filter(|r| r.strategy() == Some(ResolutionStrategy::AcceptTargetAndRegenerate))
            .map(|r| r.path().to_string())
            .collect();
        regenerate.dedup();

        Ok(ResolveOutcome::Resolved(ResolvedMerge {
            applied: set.regions.iter().map(RegionSummary::from).collect(),
            regenerate,
            commit,
        }))
    }
}

/// Per-file resolutions for an all-simple conflict set.
///
/// Lock artifacts are taken wholesale from the target; every other file
/// keeps its cleanly merged text with each conflict replaced by the target
/// side.
pub fn plan_resolutions(set: &ConflictSet) -> GateResult<Vec<FileResolution>> {
    let mut out = Vec::with_capacity(set.files.len());
    for file in &set.files {
        let lockfile = set
            .regions_for(&file.path)
            .any(|r| r.category() == ConflictCategory::LockfileRegen);
        let action = if lockfile {
            ResolutionAction::TakeTheirs
        } else {
            let merged = file.merged.as_deref().ok_or_else(|| {
                GateError::collaborator(
                    "merge workspace",
                    format!("{} has no merged content to resolve", file.path),
                )
            })?;
            let segments = split_conflicts(merged).map_err(|e| {
                GateError::collaborator("merge workspace", format!("{}: {e}", file.path))
            })?;
            ResolutionAction::Write(take_theirs(&segments))
        };
        out.push(FileResolution {
            path: file.path.clone(),
            action,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::ConflictedFile;
    use crate::conflict::classifier::ConflictClassifier;
    use crate::conflict::detector::{ConflictDetector, Detection};
    use crate::config::GateConfig;
    use crate::fakes::FakeMergeWorkspace;

    fn file(path: &str, merged: &str) -> ConflictedFile {
        ConflictedFile {
            path: path.into(),
            ours: Some(String::new()),
            theirs: Some(String::new()),
            merged: Some(merged.into()),
            binary: false,
        }
    }

    async fn detect(workspace: Arc<FakeMergeWorkspace>) -> ConflictSet {
        let detector = ConflictDetector::new(
            workspace,
            ConflictClassifier::new(GateConfig::default().lockfile_names),
        );
        match detector.detect("feature", "main").await.unwrap() {
            Detection::Conflicts(set) => set,
            Detection::NoConflicts => panic!("expected conflicts"),
        }
    }

    #[tokio::test]
    async fn test_all_simple_regions_commit_once() {
        let workspace = Arc::new(FakeMergeWorkspace::conflicted(vec![
            file("src/a.rs", "head\n<<<<<<< HEAD\nx=1\n=======\nx = 1\n>>>>>>> main\ntail\n"),
            file("yarn.lock", "<<<<<<< HEAD\na\n=======\nb\n>>>>>>> main\n"),
        ]));
        let set = detect(workspace.clone()).await;
        let outcome = ConflictResolver::new(workspace.clone()).resolve(&set).await.unwrap();

        let ResolveOutcome::Resolved(merge) = outcome else {
            panic!("expected resolution");
        };
        assert_eq!(merge.regenerate, vec!["yarn.lock".to_string()]);
        assert_eq!(merge.applied.len(), 2);

        let commits = workspace.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(
            commits[0][0].action,
            ResolutionAction::Write("head\nx = 1\ntail\n".into())
        );
        assert_eq!(commits[0][1].action, ResolutionAction::TakeTheirs);
    }

    #[tokio::test]
    async fn test_any_complex_region_aborts_whole_batch() {
        let workspace = Arc::new(FakeMergeWorkspace::conflicted(vec![
            file("src/a.rs", "<<<<<<< HEAD\nx=1\n=======\nx = 1\n>>>>>>> main\n"),
            file("src/b.rs", "<<<<<<< HEAD\nreturn a;\n=======\nreturn b;\n>>>>>>> main\n"),
        ]));
        let set = detect(workspace.clone()).await;
        let outcome = ConflictResolver::new(workspace.clone()).resolve(&set).await.unwrap();

        match outcome {
            ResolveOutcome::PartialEscalation {
                resolved,
                unresolved,
            } => {
                assert_eq!(resolved.len(), 1);
                assert_eq!(unresolved.len(), 1);
                assert_eq!(unresolved[0].category(), ConflictCategory::SemanticOverlap);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(workspace.commits().is_empty());
    }
}
