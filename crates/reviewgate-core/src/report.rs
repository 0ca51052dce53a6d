//! Escalation reports and their Markdown rendering.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::domain::{
    ChangeRequest, ConflictRegion, Dimension, EscalatedRegion, EscalationReason,
    EscalationReport, FindingSnapshot, IterationRecord, RecurringPattern, ReviewFinding,
    Severity,
};

/// Lines of each conflict side quoted in the Markdown report.
const MAX_QUOTED_LINES: usize = 30;

/// Collapse digits and whitespace so findings that differ only in line
/// numbers or counts group together.
fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut last_space = false;
    let mut last_digit = false;
    for c in message.trim().chars() {
        if c.is_ascii_digit() {
            if !last_digit {
                out.push('#');
            }
            last_digit = true;
            last_space = false;
        } else if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
            last_digit = false;
        } else {
            out.extend(c.to_lowercase());
            last_space = false;
            last_digit = false;
        }
    }
    out
}

/// Findings seen in two or more iterations, grouped by dimension, file and
/// normalised message. Ordered by descending recurrence, then first sighting.
pub fn recurring_patterns(history: &[IterationRecord]) -> Vec<RecurringPattern> {
    type Key = (Dimension, Option<String>, String);
    let mut groups: BTreeMap<Key, (String, Vec<u32>, usize)> = BTreeMap::new();
    let mut order = 0usize;
    for record in history {
        for finding in record.findings.iter() {
            let key = (
                finding.dimension,
                finding.file.clone(),
                normalize_message(&finding.message),
            );
            let entry = groups.entry(key).or_insert_with(|| {
                order += 1;
                (finding.message.clone(), Vec::new(), order)
            });
            if entry.1.last() != Some(&record.iteration) {
                entry.1.push(record.iteration);
            }
        }
    }
    let mut patterns: Vec<(usize, RecurringPattern)> = groups
        .into_iter()
        .filter(|(_, (_, iterations, _))| iterations.len() >= 2)
        .map(|((dimension, file, _), (message, iterations, first))| {
            (
                first,
                RecurringPattern {
                    dimension,
                    file,
                    message,
                    iterations,
                },
            )
        })
        .collect();
    patterns.sort_by(|a, b| {
        b.1.iterations
            .len()
            .cmp(&a.1.iterations.len())
            .then(a.0.cmp(&b.0))
    });
    patterns.into_iter().map(|(_, p)| p).collect()
}

/// Builder for [`EscalationReport`]; `build` renders the Markdown.
pub struct ReportBuilder<'a> {
    change: &'a ChangeRequest,
    reason: EscalationReason,
    detail: String,
    unresolved: Vec<EscalatedRegion>,
    resolvable: Vec<EscalatedRegion>,
    history: Vec<IterationRecord>,
    recurring: Vec<RecurringPattern>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(change: &'a ChangeRequest, reason: EscalationReason, detail: impl Into<String>) -> Self {
        Self {
            change,
            reason,
            detail: detail.into(),
            unresolved: Vec::new(),
            resolvable: Vec::new(),
            history: Vec::new(),
            recurring: Vec::new(),
        }
    }

    pub fn conflicts(mut self, unresolved: &[ConflictRegion], resolvable: &[ConflictRegion]) -> Self {
        self.unresolved = unresolved.iter().map(EscalatedRegion::from).collect();
        self.resolvable = resolvable.iter().map(EscalatedRegion::from).collect();
        self
    }

    /// Attach the iteration history and derive recurring patterns from it.
    pub fn history(mut self, history: Vec<IterationRecord>) -> Self {
        self.recurring = recurring_patterns(&history);
        self.history = history;
        self
    }

    pub fn build(self) -> EscalationReport {
        let mut report = EscalationReport {
            change_request: self.change.id.clone(),
            reason: self.reason,
            iteration_count: self.change.iteration_count(),
            max_iterations: self.change.max_iterations(),
            detail: self.detail,
            unresolved_conflicts: self.unresolved,
            resolvable_conflicts: self.resolvable,
            history: self.history,
            recurring: self.recurring,
            markdown: String::new(),
        };
        report.markdown = render_markdown(&report);
        report
    }
}

fn quote(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().take(MAX_QUOTED_LINES).collect();
    let total = text.lines().count();
    if total > MAX_QUOTED_LINES {
        lines.push("...");
    }
    lines.join("\n")
}

fn finding_line(finding: &ReviewFinding) -> String {
    match finding.location() {
        Some(location) => format!(
            "- **{}** [{}] `{location}`: {}",
            finding.severity, finding.dimension, finding.message
        ),
        None => format!(
            "- **{}** [{}] {}",
            finding.severity, finding.dimension, finding.message
        ),
    }
}

/// Comment posted when an iteration requests changes.
pub fn render_findings(iteration: u32, max_iterations: u32, findings: &FindingSnapshot) -> String {
    let mut md = String::new();
    let _ = writeln!(
        md,
        "## Changes requested (iteration {iteration} of {max_iterations})"
    );
    let _ = writeln!(md);
    let _ = writeln!(
        md,
        "{} blocking, {} should-fix, {} suggestions.",
        findings.count(Severity::Blocking),
        findings.count(Severity::ShouldFix),
        findings.count(Severity::Suggestion),
    );
    let _ = writeln!(md);
    for finding in findings.iter() {
        let _ = writeln!(md, "{}", finding_line(finding));
    }
    md
}

/// Markdown body posted to the platform on escalation.
pub fn render_markdown(report: &EscalationReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "## Escalated: {}", report.reason.title());
    let _ = writeln!(md);
    let _ = writeln!(md, "Change request `{}` needs human review.", report.change_request);
    let _ = writeln!(md);
    let _ = writeln!(md, "- Reason: `{}`", report.reason);
    let _ = writeln!(
        md,
        "- Iterations used: {} of {}",
        report.iteration_count, report.max_iterations
    );
    if !report.detail.is_empty() {
        let _ = writeln!(md, "- Detail: {}", report.detail);
    }

    if !report.unresolved_conflicts.is_empty() {
        let _ = writeln!(md);
        let _ = writeln!(md, "### Conflicts requiring resolution");
        for region in &report.unresolved_conflicts {
            let _ = writeln!(md);
            let _ = writeln!(md, "#### `{}` ({})", region.path, region.category);
            let _ = writeln!(md);
            let _ = writeln!(md, "{}", region.guidance);
            let _ = writeln!(md);
            let _ = writeln!(md, "Source branch:");
            let _ = writeln!(md, "```\n{}\n```", quote(&region.ours));
            let _ = writeln!(md, "Target branch:");
            let _ = writeln!(md, "```\n{}\n```", quote(&region.theirs));
        }
    }
    if !report.resolvable_conflicts.is_empty() {
        let _ = writeln!(md);
        let _ = writeln!(md, "### Conflicts that can be resolved automatically");
        let _ = writeln!(md);
        let _ = writeln!(
            md,
            "Not applied: the batch contains conflicts that need a human."
        );
        for region in &report.resolvable_conflicts {
            let _ = writeln!(md, "- `{}` ({})", region.path, region.category);
        }
    }

    if !report.history.is_empty() {
        let _ = writeln!(md);
        let _ = writeln!(md, "### Iteration history");
        for record in &report.history {
            let _ = writeln!(md);
            let _ = writeln!(
                md,
                "#### Iteration {}: {} ({} blocking, {} should-fix, {} suggestions)",
                record.iteration,
                record.verdict,
                record.findings.count(Severity::Blocking),
                record.findings.count(Severity::ShouldFix),
                record.findings.count(Severity::Suggestion),
            );
            for finding in record.findings.iter() {
                let _ = writeln!(md, "{}", finding_line(finding));
            }
        }
    }

    if !report.recurring.is_empty() {
        let _ = writeln!(md);
        let _ = writeln!(md, "### Recurring issues");
        for pattern in &report.recurring {
            let iterations = pattern
                .iterations
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let location = pattern
                .file
                .as_deref()
                .map(|f| format!(" `{f}`"))
                .unwrap_or_default();
            let _ = writeln!(
                md,
                "- [{}]{location}: {} (iterations {iterations})",
                pattern.dimension, pattern.message
            );
        }
    }
    md
}
