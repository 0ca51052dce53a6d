//! Conventional commit subject check.

use regex::Regex;

use crate::collaborators::CommitInfo;
use crate::domain::{Dimension, GateError, GateResult, ReviewFinding};

/// Validates `type(scope): description` subjects against a fixed type list.
#[derive(Debug, Clone)]
pub struct CommitFormat {
    pattern: Regex,
    require_scope: bool,
}

impl CommitFormat {
    pub fn new(types: &[String], require_scope: bool) -> GateResult<Self> {
        if types.is_empty() {
            return Err(GateError::Config("commit type list is empty".into()));
        }
        let alternation = types
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let scope = if require_scope {
            r"\([\w./-]+\)"
        } else {
            r"(\([\w./-]+\))?"
        };
        let pattern = Regex::new(&format!(r"^({alternation}){scope}!?: \S.*$"))
            .map_err(|e| GateError::Config(format!("invalid commit types: {e}")))?;
        Ok(Self {
            pattern,
            require_scope,
        })
    }

    pub fn is_valid(&self, subject: &str) -> bool {
        self.pattern.is_match(subject)
    }

    fn expected(&self) -> &'static str {
        if self.require_scope {
            "type(scope): description"
        } else {
            "type(scope): description (scope optional)"
        }
    }

    /// One `ShouldFix` per non-conforming commit. Merge commits are skipped.
    pub fn check(&self, commits: &[CommitInfo]) -> Vec<ReviewFinding> {
        commits
            .iter()
            .filter(|c| !c.is_merge && !c.subject().starts_with("Merge "))
            .filter(|c| !self.is_valid(c.subject()))
            .map(|c| {
                ReviewFinding::should_fix(
                    Dimension::CommitFormat,
                    format!(
                        "Commit {} does not follow `{}`: \"{}\"",
                        c.short_sha(),
                        self.expected(),
                        c.subject()
                    ),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;

    fn format(require_scope: bool) -> CommitFormat {
        CommitFormat::new(&GateConfig::default().commit_types, require_scope).unwrap()
    }

    #[test]
    fn test_valid_subjects() {
        let f = format(false);
        for subject in [
            "feat: add retry",
            "fix(parser): handle CRLF",
            "refactor(core/git)!: drop worktree cache",
            "chore(deps): bump regex to 1.10",
        ] {
            assert!(f.is_valid(subject), "{subject}");
        }
    }

    #[test]
    fn test_invalid_subjects() {
        let f = format(false);
        for subject in [
            "added retry",
            "feature: add retry",
            "fix:missing space",
            "fix(): empty scope",
            "Fix: capitalised type",
            "fix: ",
        ] {
            assert!(!f.is_valid(subject), "{subject}");
        }
    }

    #[test]
    fn test_scope_can_be_required() {
        let f = format(true);
        assert!(!f.is_valid("feat: add retry"));
        assert!(f.is_valid("feat(ci): add retry"));
    }

    #[test]
    fn test_merge_commits_are_skipped() {
        let commits = vec![
            CommitInfo::new("aaaaaaaaaa", "Merge branch 'main' into feature").merge(),
            CommitInfo::new("dddddddddd", "Merge pull request #4 from feature"),
            CommitInfo::new("bbbbbbbbbb", "wip"),
            CommitInfo::new("cccccccccc", "test: cover parser"),
        ];
        let findings = format(false).check(&commits);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("bbbbbbbb"));
        assert_eq!(findings[0].dimension, Dimension::CommitFormat);
    }

    #[test]
    fn test_empty_type_list_is_config_error() {
        assert!(CommitFormat::new(&[], false).is_err());
    }
}
