//! Quality review across four dimensions.
//!
//! Each dimension is evaluated independently against the same evidence and
//! contributes findings; the verdict is derived from the combined set.

pub mod code_quality;
pub mod commit_format;
pub mod spec_adherence;
pub mod test_coverage;

use std::sync::Arc;

use tracing::debug;

use crate::collaborators::{CommitInfo, RepoPaths, StaticAnalysisTool, WorkItem};
use crate::config::GateConfig;
use crate::diff::FileDiff;
use crate::domain::{ChangeRequest, GateResult, ReviewFinding};
use crate::retry::RetryPolicy;

pub use commit_format::CommitFormat;

/// Everything the reviewer looks at for one revision.
#[derive(Debug, Clone, Default)]
pub struct ChangeEvidence {
    pub changed_files: Vec<String>,
    pub diff: Vec<FileDiff>,
    pub commits: Vec<CommitInfo>,
}

pub struct QualityReviewer {
    analyzer: Arc<dyn StaticAnalysisTool>,
    repo_paths: Arc<dyn RepoPaths>,
    retry: RetryPolicy,
    commit_format: CommitFormat,
    match_ratio: f64,
}

impl QualityReviewer {
    pub fn new(
        config: &GateConfig,
        analyzer: Arc<dyn StaticAnalysisTool>,
        repo_paths: Arc<dyn RepoPaths>,
    ) -> GateResult<Self> {
        Ok(Self {
            analyzer,
            repo_paths,
            retry: config.retry.clone(),
            commit_format: CommitFormat::new(&config.commit_types, config.require_commit_scope)?,
            match_ratio: config.criterion_match_ratio,
        })
    }

    /// Findings for one revision, in dimension order.
    pub async fn review(
        &self,
        change: &ChangeRequest,
        work_item: Option<&WorkItem>,
        evidence: &ChangeEvidence,
    ) -> GateResult<Vec<ReviewFinding>> {
        let mut findings = spec_adherence::check(work_item, &evidence.diff, self.match_ratio);
        findings.extend(code_quality::check(self.analyzer.as_ref(), &evidence.diff, &self.retry).await?);
        findings.extend(test_coverage::check(
            &evidence.diff,
            &evidence.changed_files,
            self.repo_paths.as_ref(),
        ));
        findings.extend(self.commit_format.check(&evidence.commits));
        debug!(
            change_request = %change.id,
            findings = findings.len(),
            "review dimensions evaluated"
        );
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{Diagnostic, DiagnosticLevel};
    use crate::diff::parse_unified_diff;
    use crate::domain::{derive_verdict, Dimension, ReviewVerdict};
    use crate::fakes::{FakeAnalyzer, FakeRepoPaths};

    fn change() -> ChangeRequest {
        ChangeRequest::new("cr-7", "feature/retry", "main")
    }

    fn evidence(commit: &str) -> ChangeEvidence {
        let diff = parse_unified_diff(
            "\
diff --git a/src/retry.rs b/src/retry.rs
--- a/src/retry.rs
+++ b/src/retry.rs
@@ -1,0 +1,1 @@
+pub fn retry_delay() {}
",
        )
        .unwrap();
        ChangeEvidence {
            changed_files: vec!["src/retry.rs".into()],
            diff,
            commits: vec![CommitInfo::new("0123456789", commit)],
        }
    }

    #[tokio::test]
    async fn test_clean_change_is_approved() {
        let reviewer = QualityReviewer::new(
            &GateConfig::default(),
            Arc::new(FakeAnalyzer::new()),
            Arc::new(FakeRepoPaths::with(["tests/retry.rs"])),
        )
        .unwrap();
        let findings = reviewer
            .review(&change(), None, &evidence("feat(retry): add delay"))
            .await
            .unwrap();
        assert!(findings.is_empty(), "{findings:?}");
        assert_eq!(derive_verdict(&findings), ReviewVerdict::Approved);
    }

    #[tokio::test]
    async fn test_every_dimension_contributes() {
        let analyzer = FakeAnalyzer::new();
        analyzer.add(Diagnostic {
            file: "src/retry.rs".into(),
            line: Some(1),
            level: DiagnosticLevel::Warning,
            message: "missing docs".into(),
            rule: None,
        });
        let reviewer = QualityReviewer::new(
            &GateConfig::default(),
            Arc::new(analyzer),
            Arc::new(FakeRepoPaths::default()),
        )
        .unwrap();
        let item = WorkItem {
            id: "TRK-9".into(),
            title: "Retry".into(),
            body: "- [ ] Record the timeout histogram".into(),
        };
        let findings = reviewer
            .review(&change(), Some(&item), &evidence("add delay"))
            .await
            .unwrap();
        for dimension in [
            Dimension::SpecAdherence,
            Dimension::CodeQuality,
            Dimension::TestCoverage,
            Dimension::CommitFormat,
        ] {
            assert!(
                findings.iter().any(|f| f.dimension == dimension),
                "missing {dimension}"
            );
        }
    }
}
