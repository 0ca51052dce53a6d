//! Reviewer findings, immutable per-iteration snapshots and verdict derivation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// How urgently a finding must be addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Blocking,
    ShouldFix,
    Suggestion,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Blocking => "blocking",
            Severity::ShouldFix => "should_fix",
            Severity::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which quality gate produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    SpecAdherence,
    CodeQuality,
    TestCoverage,
    CommitFormat,
    /// In-scope CI failures surfaced as findings.
    ContinuousIntegration,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::SpecAdherence => "spec_adherence",
            Dimension::CodeQuality => "code_quality",
            Dimension::TestCoverage => "test_coverage",
            Dimension::CommitFormat => "commit_format",
            Dimension::ContinuousIntegration => "continuous_integration",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reviewer observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub severity: Severity,
    pub dimension: Dimension,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub message: String,
}

impl ReviewFinding {
    pub fn new(severity: Severity, dimension: Dimension, message: impl Into<String>) -> Self {
        Self {
            severity,
            dimension,
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn blocking(dimension: Dimension, message: impl Into<String>) -> Self {
        Self::new(Severity::Blocking, dimension, message)
    }

    pub fn should_fix(dimension: Dimension, message: impl Into<String>) -> Self {
        Self::new(Severity::ShouldFix, dimension, message)
    }

    pub fn suggestion(dimension: Dimension, message: impl Into<String>) -> Self {
        Self::new(Severity::Suggestion, dimension, message)
    }

    pub fn at(mut self, file: impl Into<String>, line: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = line;
        self
    }

    /// `file:line` or `file`, when a location is known.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}

/// Outcome of one review pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewVerdict::Approved => f.write_str("approved"),
            ReviewVerdict::ChangesRequested => f.write_str("changes_requested"),
        }
    }
}

/// Pure verdict derivation: any `Blocking` or `ShouldFix` finding requests
/// changes; suggestions alone never do.
pub fn derive_verdict(findings: &[ReviewFinding]) -> ReviewVerdict {
    if findings
        .iter()
        .any(|f| matches!(f.severity, Severity::Blocking | Severity::ShouldFix))
    {
        ReviewVerdict::ChangesRequested
    } else {
        ReviewVerdict::Approved
    }
}

/// Immutable, cheaply clonable set of findings from one iteration.
///
/// A new iteration always builds a new snapshot; nothing hands out `&mut`
/// access to the findings inside.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FindingSnapshot(Arc<[ReviewFinding]>);

impl FindingSnapshot {
    /// Freeze a finding list, ordered by severity (stable within a severity).
    pub fn new(mut findings: Vec<ReviewFinding>) -> Self {
        findings.sort_by_key(|f| f.severity);
        Self(findings.into())
    }

    pub fn findings(&self) -> &[ReviewFinding] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|f| f.severity == severity).count()
    }

    pub fn verdict(&self) -> ReviewVerdict {
        derive_verdict(&self.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReviewFinding> {
        self.0.iter()
    }
}

impl Serialize for FindingSnapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FindingSnapshot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let findings = Vec::<ReviewFinding>::deserialize(deserializer)?;
        Ok(Self(findings.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_approved_without_findings() {
        assert_eq!(derive_verdict(&[]), ReviewVerdict::Approved);
    }

    #[test]
    fn test_verdict_suggestions_only_is_approved() {
        let findings = vec![ReviewFinding::suggestion(Dimension::CodeQuality, "nit")];
        assert_eq!(derive_verdict(&findings), ReviewVerdict::Approved);
    }

    #[test]
    fn test_verdict_should_fix_gates_like_blocking() {
        let should_fix = vec![ReviewFinding::should_fix(Dimension::CommitFormat, "bad msg")];
        let blocking = vec![ReviewFinding::blocking(Dimension::SpecAdherence, "missing")];
        assert_eq!(derive_verdict(&should_fix), ReviewVerdict::ChangesRequested);
        assert_eq!(derive_verdict(&blocking), ReviewVerdict::ChangesRequested);
    }

    #[test]
    fn test_snapshot_orders_by_severity_and_counts() {
        let snapshot = FindingSnapshot::new(vec![
            ReviewFinding::suggestion(Dimension::CodeQuality, "c"),
            ReviewFinding::should_fix(Dimension::TestCoverage, "b"),
            ReviewFinding::blocking(Dimension::SpecAdherence, "a"),
        ]);
        let order: Vec<_> = snapshot.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(snapshot.count(Severity::Blocking), 1);
        assert_eq!(snapshot.verdict(), ReviewVerdict::ChangesRequested);
    }

    #[test]
    fn test_snapshot_clones_share_storage() {
        let a = FindingSnapshot::new(vec![ReviewFinding::blocking(Dimension::CodeQuality, "x")]);
        let b = a.clone();
        assert!(std::ptr::eq(a.findings().as_ptr(), b.findings().as_ptr()));
    }

    #[test]
    fn test_snapshot_serde_is_plain_list() {
        let snapshot = FindingSnapshot::new(vec![
            ReviewFinding::should_fix(Dimension::TestCoverage, "no test").at("src/a.rs", Some(3)),
        ]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["file"], "src/a.rs");
        let back: FindingSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
