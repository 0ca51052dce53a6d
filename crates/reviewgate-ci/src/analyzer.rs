//! Command-driven [`StaticAnalysisTool`].
//!
//! Runs a linter once per file and reads diagnostics in the common
//! `path:line[:col]: severity: message [rule]` form that gcc, clang,
//! eslint (`--format unix`), ruff, flake8 and most others can emit.

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reviewgate_core::{Diagnostic, DiagnosticLevel, GateError, GateResult, StaticAnalysisTool};

use crate::check::CheckConfig;
use crate::runner::CheckRunner;

static DIAGNOSTIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<path>[^:\s][^:]*):(?P<line>\d+)(?::\d+)?:\s*(?P<level>error|warning|warn|note|info|help)(?:\[(?P<code>[^\]]+)\])?:\s*(?P<message>.*?)(?:\s+\[(?P<rule>[\w./@-]+)\])?\s*$",
    )
    .expect("diagnostic pattern is valid")
});

fn level_for(word: &str) -> DiagnosticLevel {
    match word {
        "error" => DiagnosticLevel::Error,
        "warning" | "warn" => DiagnosticLevel::Warning,
        _ => DiagnosticLevel::Info,
    }
}

/// Parse every diagnostic line of `output`; other lines are ignored.
pub fn parse_diagnostics(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| {
            let caps = DIAGNOSTIC_LINE.captures(line.trim_end())?;
            let rule = caps
                .name("rule")
                .or_else(|| caps.name("code"))
                .map(|m| m.as_str().to_string());
            Some(Diagnostic {
                file: caps["path"].trim_start_matches("./").to_string(),
                line: caps["line"].parse().ok(),
                level: level_for(&caps["level"]),
                message: caps["message"].to_string(),
                rule,
            })
        })
        .collect()
}

/// Runs `command <path>` in `workdir` for each analyzed file.
///
/// A non-zero exit is expected when the linter finds something; only
/// spawn failures and timeouts are errors.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    command: Vec<String>,
    workdir: PathBuf,
    timeout_secs: u64,
}

impl CommandAnalyzer {
    pub fn new(command: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command,
            workdir: workdir.into(),
            timeout_secs: 120,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[async_trait]
impl StaticAnalysisTool for CommandAnalyzer {
    async fn analyze(&self, path: &str) -> GateResult<Vec<Diagnostic>> {
        let mut command = self.command.clone();
        command.push(path.to_string());
        let config = CheckConfig::custom("analyze", command, self.timeout_secs);
        let outcome = CheckRunner::execute(&config, &self.workdir)
            .await
            .map_err(|e| GateError::collaborator("analyzer", format!("{e:#}")))?;
        if outcome.timed_out {
            return Err(GateError::transient("analyzer", outcome.stderr));
        }
        Ok(parse_diagnostics(&outcome.log())
            .into_iter()
            .filter(|d| d.file == path)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_format() {
        let out = "\
src/app.js:12:5: error: 'x' is assigned a value but never used [no-unused-vars]
src/app.js:40: warning: Unexpected console statement
3 problems found
";
        let diags = parse_diagnostics(out);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].file, "src/app.js");
        assert_eq!(diags[0].line, Some(12));
        assert_eq!(diags[0].level, DiagnosticLevel::Error);
        assert_eq!(diags[0].message, "'x' is assigned a value but never used");
        assert_eq!(diags[0].rule.as_deref(), Some("no-unused-vars"));
        assert_eq!(diags[1].level, DiagnosticLevel::Warning);
        assert!(diags[1].rule.is_none());
    }

    #[test]
    fn test_parse_bracketed_code_and_dot_prefix() {
        let diags = parse_diagnostics("./lib/x.c:7:1: warning[W123]: implicit declaration\n");
        assert_eq!(diags[0].file, "lib/x.c");
        assert_eq!(diags[0].rule.as_deref(), Some("W123"));
        assert_eq!(diags[0].message, "implicit declaration");

        let note = parse_diagnostics("a.py:1: note: consider a dataclass\n");
        assert_eq!(note[0].level, DiagnosticLevel::Info);
    }

    #[tokio::test]
    async fn test_analyze_keeps_only_the_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = "echo \"$1:3:1: error: bad thing [rule-a]\"; echo 'other.rs:1:1: warning: noise'; exit 1";
        let analyzer = CommandAnalyzer::new(
            vec!["sh".into(), "-c".into(), script.into(), "lint".into()],
            dir.path(),
        );
        let diags = analyzer.analyze("src/lib.rs").await.unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "src/lib.rs");
        assert_eq!(diags[0].rule.as_deref(), Some("rule-a"));
    }
}
