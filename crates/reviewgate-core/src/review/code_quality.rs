//! Static-analysis findings for changed files.

use crate::collaborators::{Diagnostic, DiagnosticLevel, StaticAnalysisTool};
use crate::diff::FileDiff;
use crate::domain::{Dimension, GateResult, ReviewFinding, Severity};
use crate::retry::{with_retry, RetryPolicy};

pub fn severity_for(level: DiagnosticLevel) -> Severity {
    match level {
        DiagnosticLevel::Error => Severity::Blocking,
        DiagnosticLevel::Warning => Severity::ShouldFix,
        DiagnosticLevel::Info => Severity::Suggestion,
    }
}

pub fn finding_for(diagnostic: &Diagnostic) -> ReviewFinding {
    let message = match &diagnostic.rule {
        Some(rule) => format!("{} [{rule}]", diagnostic.message),
        None => diagnostic.message.clone(),
    };
    ReviewFinding::new(severity_for(diagnostic.level), Dimension::CodeQuality, message)
        .at(diagnostic.file.clone(), diagnostic.line)
}

/// Run the analyzer on every changed, non-deleted, non-binary file.
pub async fn check(
    analyzer: &dyn StaticAnalysisTool,
    diff: &[FileDiff],
    retry: &RetryPolicy,
) -> GateResult<Vec<ReviewFinding>> {
    let mut findings = Vec::new();
    for file in diff {
        if file.is_deleted_file || file.is_binary {
            continue;
        }
        let diagnostics =
            with_retry(retry, "analysis.analyze", || analyzer.analyze(&file.path)).await?;
        findings.extend(diagnostics.iter().map(finding_for));
    }
    Ok(findings)
}
