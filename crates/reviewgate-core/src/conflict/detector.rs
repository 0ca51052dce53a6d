//! Trial-merge conflict detection.

use std::sync::Arc;

use crate::collaborators::{ConflictedFile, MergeWorkspace, TrialMerge};
use crate::domain::{ConflictHunk, ConflictRegion, GateResult, HunkOrigin};

use super::classifier::ConflictClassifier;
use super::markers::{split_conflicts, Segment};

/// Conflicts found by one trial merge, classified.
///
/// Lives only for one detect/resolve attempt and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSet {
    pub source_ref: String,
    pub target_ref: String,
    pub files: Vec<ConflictedFile>,
    pub regions: Vec<ConflictRegion>,
}

impl ConflictSet {
    pub fn all_simple(&self) -> bool {
        self.regions.iter().all(ConflictRegion::is_simple)
    }

    pub fn regions_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ConflictRegion> {
        self.regions.iter().filter(move |r| r.path() == path)
    }
}

/// Outcome of [`ConflictDetector::detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    NoConflicts,
    Conflicts(ConflictSet),
}

pub struct ConflictDetector {
    workspace: Arc<dyn MergeWorkspace>,
    classifier: ConflictClassifier,
}

impl ConflictDetector {
    pub fn new(workspace: Arc<dyn MergeWorkspace>, classifier: ConflictClassifier) -> Self {
        Self {
            workspace,
            classifier,
        }
    }

    pub fn classifier(&self) -> &ConflictClassifier {
        &self.classifier
    }

    /// Trial-merge `target_ref` into `source_ref` and classify every
    /// conflicting hunk. The workspace is rolled back either way.
    pub async fn detect(&self, source_ref: &str, target_ref: &str) -> GateResult<Detection> {
        match self.workspace.trial_merge(source_ref, target_ref).await? {
            TrialMerge::Clean => Ok(Detection::NoConflicts),
            TrialMerge::Conflicted(files) => {
                let regions = files
                    .iter()
                    .flat_map(extract_hunks)
                    .map(|hunk| self.classifier.classify(hunk))
                    .collect();
                Ok(Detection::Conflicts(ConflictSet {
                    source_ref: source_ref.to_string(),
                    target_ref: target_ref.to_string(),
                    files,
                    regions,
                }))
            }
        }
    }
}

/// Split one conflicted file into raw hunks.
///
/// Deletions become a single file-level hunk; binary files and files whose
/// markers cannot be parsed become a single `Unparsed` hunk.
pub fn extract_hunks(file: &ConflictedFile) -> Vec<ConflictHunk> {
    if file.ours.is_none() || file.theirs.is_none() {
        return vec![ConflictHunk {
            path: file.path.clone(),
            ours: file.ours.clone(),
            theirs: file.theirs.clone(),
            base: None,
            origin: HunkOrigin::Deletion,
        }];
    }
    let unparsed = || {
        // Binary sides carry no text worth classifying.
        let side = |s: &Option<String>| {
            if file.binary {
                String::new()
            } else {
                s.clone().unwrap_or_default()
            }
        };
        ConflictHunk {
            path: file.path.clone(),
            ours: Some(side(&file.ours)),
            theirs: Some(side(&file.theirs)),
            base: None,
            origin: HunkOrigin::Unparsed,
        }
    };
    let merged = match file.merged.as_deref() {
        Some(merged) if !file.binary => merged,
        _ => return vec![unparsed()],
    };
    match split_conflicts(merged) {
        Ok(segments) => segments
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Conflict { ours, base, theirs } => Some(ConflictHunk {
                    path: file.path.clone(),
                    ours: Some(ours),
                    theirs: Some(theirs),
                    base,
                    origin: HunkOrigin::Markers,
                }),
                Segment::Clean(_) => None,
            })
            .collect(),
        Err(_) => vec![unparsed()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::domain::ConflictCategory;
    use crate::fakes::FakeMergeWorkspace;

    fn text_file(path: &str, merged: &str) -> ConflictedFile {
        ConflictedFile {
            path: path.into(),
            ours: Some("ours\n".into()),
            theirs: Some("theirs\n".into()),
            merged: Some(merged.into()),
            binary: false,
        }
    }

    #[test]
    fn test_one_hunk_per_conflict_block() {
        let file = text_file(
            "src/a.rs",
            "<<<<<<< HEAD\na\n=======\nb\n>>>>>>> main\nmid\n<<<<<<< HEAD\nc\n=======\nd\n>>>>>>> main\n",
        );
        let hunks = extract_hunks(&file);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].ours.as_deref(), Some("c\n"));
        assert!(hunks.iter().all(|h| h.origin == HunkOrigin::Markers));
    }

    #[test]
    fn test_broken_markers_become_unparsed() {
        let file = text_file("src/a.rs", "<<<<<<< HEAD\na\n");
        let hunks = extract_hunks(&file);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].origin, HunkOrigin::Unparsed);
    }

    #[test]
    fn test_deleted_side_is_file_level_hunk() {
        let file = ConflictedFile {
            path: "src/gone.rs".into(),
            ours: None,
            theirs: Some("fn x() {}\n".into()),
            merged: None,
            binary: false,
        };
        let hunks = extract_hunks(&file);
        assert_eq!(hunks[0].origin, HunkOrigin::Deletion);
        assert!(hunks[0].ours.is_none());
    }

    #[tokio::test]
    async fn test_detect_clean_merge() {
        let workspace = Arc::new(FakeMergeWorkspace::clean());
        let detector = ConflictDetector::new(
            workspace.clone(),
            ConflictClassifier::new(GateConfig::default().lockfile_names),
        );
        let detection = detector.detect("feature", "main").await.unwrap();
        assert_eq!(detection, Detection::NoConflicts);
        assert_eq!(workspace.trial_merges(), 1);
    }

    #[tokio::test]
    async fn test_detect_classifies_regions() {
        let workspace = Arc::new(FakeMergeWorkspace::conflicted(vec![
            text_file("src/a.rs", "<<<<<<< HEAD\nlet a=1;\n=======\nlet a = 1;\n>>>>>>> main\n"),
            text_file("Cargo.lock", "<<<<<<< HEAD\nv1\n=======\nv2\n>>>>>>> main\n"),
        ]));
        let detector = ConflictDetector::new(
            workspace,
            ConflictClassifier::new(GateConfig::default().lockfile_names),
        );
        let Detection::Conflicts(set) = detector.detect("feature", "main").await.unwrap() else {
            panic!("expected conflicts");
        };
        let categories: Vec<_> = set.regions.iter().map(|r| r.category()).collect();
        assert_eq!(
            categories,
            vec![ConflictCategory::WhitespaceOnly, ConflictCategory::LockfileRegen]
        );
        assert!(set.all_simple());
    }
}
