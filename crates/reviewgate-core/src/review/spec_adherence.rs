//! Acceptance-criteria adherence.
//!
//! Criteria come from the linked work item: checkbox lines anywhere in the
//! body, plus list items under an "Acceptance Criteria" heading. A criterion
//! counts as addressed when enough of its keywords show up in the change's
//! paths and added lines.

use std::collections::BTreeSet;

use crate::collaborators::WorkItem;
use crate::diff::FileDiff;
use crate::domain::{Dimension, ReviewFinding};

use super::test_coverage::{is_source_file, is_test_path};

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "when", "then", "should", "must",
    "will", "can", "are", "was", "were", "has", "have", "been", "not", "all", "any", "each",
    "shall", "given", "via", "its", "our", "your", "they", "there", "their", "also", "only",
    "more", "than", "such", "use", "used", "using", "new",
];

/// Acceptance criteria listed in a work item body, in order, deduplicated.
pub fn extract_criteria(body: &str) -> Vec<String> {
    let mut criteria: Vec<String> = Vec::new();
    let mut in_section = false;
    for raw in body.lines() {
        let line = raw.trim();
        if is_heading(line) {
            in_section = line.to_ascii_lowercase().contains("acceptance criteria");
            continue;
        }
        let item = if let Some(text) = checkbox_text(line) {
            Some(text)
        } else if in_section {
            list_item_text(line)
        } else {
            None
        };
        if let Some(text) = item.map(str::trim).filter(|t| !t.is_empty()) {
            if !criteria.iter().any(|c| c == text) {
                criteria.push(text.to_string());
            }
        }
    }
    criteria
}

fn is_heading(line: &str) -> bool {
    if line.starts_with('#') {
        return true;
    }
    // A list item ending in a colon is still a list item.
    if list_item_text(line).is_some() {
        return false;
    }
    // `**Acceptance Criteria**` or `Acceptance criteria:` on a line of its own.
    let bare = line.trim_matches('*').trim_end_matches(':').trim();
    !bare.is_empty() && bare.len() < 60 && (line.starts_with("**") || line.ends_with(':'))
}

fn checkbox_text(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))?;
    ["[ ] ", "[x] ", "[X] "]
        .iter()
        .find_map(|mark| rest.strip_prefix(mark))
}

fn list_item_text(line: &str) -> Option<&str> {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return Some(rest);
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        return rest
            .strip_prefix(". ")
            .or_else(|| rest.strip_prefix(") "));
    }
    None
}

fn normalize(word: &str) -> String {
    let w = word.to_ascii_lowercase();
    if w.len() > 4 && w.ends_with('s') && !w.ends_with("ss") {
        w[..w.len() - 1].to_string()
    } else {
        w
    }
}

/// Split text into normalised words, breaking identifiers on `_`, `-` and camelCase.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for chunk in text.split(|c: char| !c.is_alphanumeric()) {
        if chunk.is_empty() {
            continue;
        }
        let mut word = String::new();
        let mut prev_lower = false;
        for c in chunk.chars() {
            if c.is_uppercase() && prev_lower && !word.is_empty() {
                out.insert(normalize(&word));
                word.clear();
            }
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
            word.push(c);
        }
        if !word.is_empty() {
            out.insert(normalize(&word));
        }
        if chunk.chars().any(char::is_uppercase) {
            out.insert(normalize(chunk));
        }
    }
    out
}

/// Significant words of a criterion.
pub fn keywords(criterion: &str) -> BTreeSet<String> {
    tokenize(criterion)
        .into_iter()
        .filter(|w| w.len() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn file_tokens(file: &FileDiff) -> BTreeSet<String> {
    let mut tokens = tokenize(&file.path);
    for line in file.added_lines() {
        tokens.extend(tokenize(line));
    }
    tokens
}

fn coverage(keywords: &BTreeSet<String>, haystack: &BTreeSet<String>) -> f64 {
    if keywords.is_empty() {
        return 1.0;
    }
    let hits = keywords.iter().filter(|k| haystack.contains(*k)).count();
    hits as f64 / keywords.len() as f64
}

/// Findings for one work item against the parsed diff.
pub fn check(work_item: Option<&WorkItem>, diff: &[FileDiff], match_ratio: f64) -> Vec<ReviewFinding> {
    let Some(item) = work_item else {
        return Vec::new();
    };
    let criteria = extract_criteria(&item.body);
    if criteria.is_empty() {
        return Vec::new();
    }

    let per_file: Vec<(&FileDiff, BTreeSet<String>)> =
        diff.iter().map(|f| (f, file_tokens(f))).collect();
    let all: BTreeSet<String> = per_file.iter().flat_map(|(_, t)| t.iter().cloned()).collect();
    let criteria_keywords: Vec<BTreeSet<String>> = criteria.iter().map(|c| keywords(c)).collect();

    let mut findings = Vec::new();
    for (criterion, kw) in criteria.iter().zip(&criteria_keywords) {
        if coverage(kw, &all) < match_ratio {
            findings.push(ReviewFinding::blocking(
                Dimension::SpecAdherence,
                format!("Acceptance criterion of {} not addressed: {criterion}", item.id),
            ));
        }
    }

    for (file, tokens) in &per_file {
        if file.is_deleted_file || !is_source_file(&file.path) || is_test_path(&file.path) {
            continue;
        }
        let related = criteria_keywords
            .iter()
            .any(|kw| kw.iter().any(|k| tokens.contains(k)));
        if !related {
            findings.push(
                ReviewFinding::should_fix(
                    Dimension::SpecAdherence,
                    format!(
                        "Possible scope expansion: changes to {} match no acceptance criterion of {}",
                        file.path, item.id
                    ),
                )
                .at(file.path.clone(), file.hunks.first().map(|h| h.new_start)),
            );
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_unified_diff;
    use crate::domain::Severity;

    const BODY: &str = "\
Some context about the feature.

- [ ] Parse retry configuration from the environment
- [x] Log every retry attempt

## Acceptance Criteria
1. Timeout errors are reported
- Parse retry configuration from the environment

## Notes
- this is not a criterion
";

    fn item(body: &str) -> WorkItem {
        WorkItem {
            id: "TRK-1".into(),
            title: "Retries".into(),
            body: body.into(),
        }
    }

    #[test]
    fn test_extract_criteria_checkboxes_and_section() {
        let criteria = extract_criteria(BODY);
        assert_eq!(
            criteria,
            vec![
                "Parse retry configuration from the environment".to_string(),
                "Log every retry attempt".to_string(),
                "Timeout errors are reported".to_string(),
            ]
        );
    }

    #[test]
    fn test_bold_heading_starts_section() {
        let criteria = extract_criteria("**Acceptance Criteria**\n- cache results\n");
        assert_eq!(criteria, vec!["cache results".to_string()]);
    }

    #[test]
    fn test_list_items_ending_in_colon_stay_in_section() {
        let body = "\
## Acceptance Criteria
1. Errors reported:
- Retries are bounded
+ Backoff doubles:
2) Jitter applied
";
        assert_eq!(
            extract_criteria(body),
            vec![
                "Errors reported:".to_string(),
                "Retries are bounded".to_string(),
                "Backoff doubles:".to_string(),
                "Jitter applied".to_string(),
            ]
        );
        let criteria = extract_criteria("Acceptance criteria:\n- cache results\n");
        assert_eq!(criteria, vec!["cache results".to_string()]);
    }

    #[test]
    fn test_tokenize_splits_identifiers() {
        let tokens = tokenize("fn parseRetryConfig(env_vars: &str)");
        assert!(tokens.contains("parse"));
        assert!(tokens.contains("retry"));
        assert!(tokens.contains("config"));
        assert!(tokens.contains("env"));
        assert!(tokens.contains("vars"));
    }

    #[test]
    fn test_unaddressed_criterion_blocks_and_unrelated_file_flags_scope() {
        let diff = parse_unified_diff(
            "\
diff --git a/src/retry.rs b/src/retry.rs
--- a/src/retry.rs
+++ b/src/retry.rs
@@ -1,1 +1,3 @@
 mod x;
+fn parse_retry_configuration(environment: &Env) {}
+fn log_retry_attempt(attempt: u32) { tracing::info!(attempt); }
diff --git a/src/billing.rs b/src/billing.rs
--- a/src/billing.rs
+++ b/src/billing.rs
@@ -1,1 +1,2 @@
 mod y;
+fn invoice_total() {}
",
        )
        .unwrap();
        let findings = check(Some(&item(BODY)), &diff, 0.5);
        let blocking: Vec<_> = findings
            .iter()
            .filter(|f| f.severity == Severity::Blocking)
            .collect();
        assert_eq!(blocking.len(), 1);
        assert!(blocking[0].message.contains("Timeout errors"));

        let scope: Vec<_> = findings
            .iter()
            .filter(|f| f.severity == Severity::ShouldFix)
            .collect();
        assert_eq!(scope.len(), 1);
        assert_eq!(scope[0].file.as_deref(), Some("src/billing.rs"));
    }

    #[test]
    fn test_no_work_item_or_criteria_yields_nothing() {
        assert!(check(None, &[], 0.5).is_empty());
        assert!(check(Some(&item("just prose")), &[], 0.5).is_empty());
    }
}
