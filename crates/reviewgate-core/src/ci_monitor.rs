//! CI status monitor: waits for checks to settle and triages failures.
//!
//! The poll loop is the only suspension point of a review cycle and is
//! bounded by an explicit timeout. A timeout is reported as
//! [`GateError::CiTimeout`], never as a failure classification.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::collaborators::{ContinuousIntegrationService, FollowUp};
use crate::domain::{
    ChangeRequest, Check, CheckTriage, CiRun, GateError, GateResult, Triage,
};
use crate::obs;
use crate::retry::{with_retry, RetryPolicy};

/// Lines of failure log quoted in follow-up work items.
const LOG_EXCERPT_LINES: usize = 40;

pub struct CiMonitor {
    ci: Arc<dyn ContinuousIntegrationService>,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl CiMonitor {
    pub fn new(
        ci: Arc<dyn ContinuousIntegrationService>,
        retry: RetryPolicy,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ci,
            retry,
            poll_interval,
        }
    }

    /// Poll until every check is terminal or `timeout` elapses.
    ///
    /// Transient CI faults are retried per the retry policy; retry waits
    /// count against `timeout`.
    pub async fn await_completion(
        &self,
        change: &ChangeRequest,
        timeout: Duration,
    ) -> GateResult<CiRun> {
        let poll = async {
            let mut polls = 0u32;
            loop {
                polls += 1;
                let checks = with_retry(&self.retry, "ci.get_checks", || {
                    self.ci.get_checks(&change.id)
                })
                .await?;
                let run = CiRun::from_checks(checks);
                if run.is_complete() {
                    debug!(change_request = %change.id, polls, "ci settled");
                    return Ok(run);
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(GateError::CiTimeout {
                change_request: change.id.to_string(),
                waited_secs: timeout.as_secs(),
            }),
        }
    }

    /// Attach triage for every failed check of `run`.
    pub fn triage(&self, change: &ChangeRequest, run: &mut CiRun, changed_files: &[String]) {
        run.triage = run
            .failed_checks()
            .map(|check| classify_failure(check, changed_files))
            .collect();
        for t in &run.triage {
            obs::emit_ci_triaged(change.id.as_str(), &t.check, t.triage);
        }
    }
}

/// A failure is in scope when its log references a file of the change.
pub fn classify_failure(check: &Check, changed_files: &[String]) -> CheckTriage {
    let mut referenced: Vec<String> = Vec::new();
    for token in log_path_tokens(&check.log) {
        for file in changed_files {
            if path_matches(&token, file) && !referenced.contains(file) {
                referenced.push(file.clone());
            }
        }
    }
    CheckTriage {
        check: check.name.clone(),
        triage: if referenced.is_empty() {
            Triage::OutOfScope
        } else {
            Triage::InScope
        },
        referenced_files: referenced,
    }
}

/// Path-like tokens from a log, with `:line:col` suffixes and `./` prefixes removed.
pub fn log_path_tokens(log: &str) -> Vec<String> {
    let separators = |c: char| {
        c.is_whitespace()
            || matches!(
                c,
                '(' | ')' | '[' | ']' | '{' | '}' | '<' | '>' | '"' | '\'' | '`' | ',' | ';' | '='
                    | '|'
            )
    };
    let mut tokens = Vec::new();
    for raw in log.split(separators) {
        let path = raw.split(':').next().unwrap_or(raw);
        let path = path.trim_end_matches(['.', ',']);
        let path = path.trim_start_matches("./");
        if path.is_empty() || !(path.contains('/') || path.contains('.')) {
            continue;
        }
        if path.starts_with("http") || path.chars().all(|c| c.is_ascii_digit() || c == '.') {
            continue;
        }
        let path = path.to_string();
        if !tokens.contains(&path) {
            tokens.push(path);
        }
    }
    tokens
}

/// `token` names `file` exactly or as a longer path ending in `/file`.
pub fn path_matches(token: &str, file: &str) -> bool {
    let file = file.trim_start_matches("./");
    token == file
        || token
            .strip_suffix(file)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

/// Follow-up request for a failure the change did not cause.
pub fn follow_up_for(check: &Check, change: &ChangeRequest, project: Option<&str>) -> FollowUp {
    let lines: Vec<&str> = check.log.lines().collect();
    let start = lines.len().saturating_sub(LOG_EXCERPT_LINES);
    let excerpt = lines[start..].join("\n");

    let mut body = format!(
        "CI check `{}` failed while reviewing change request {} (`{}` into `{}`), \
         but its log references none of the files that change touches.\n\n\
         The failure appears to pre-date the change and needs its own fix.\n",
        check.name, change.id, change.source_ref, change.target_ref
    );
    if !excerpt.trim().is_empty() {
        body.push_str("\n<details><summary>Log excerpt</summary>\n\n```\n");
        body.push_str(&excerpt);
        body.push_str("\n```\n\n</details>\n");
    }

    FollowUp {
        title: format!("CI check `{}` failing on {}", check.name, change.target_ref),
        body,
        project: project.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckStatus;
    use crate::fakes::FakeCi;

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_log_tokens_strip_locations() {
        let log = "error[E0308]: mismatched types\n  --> ./src/lib.rs:10:5\nFAILED (tests/test_api.py::test_get)";
        let tokens = log_path_tokens(log);
        assert!(tokens.contains(&"src/lib.rs".to_string()));
        assert!(tokens.contains(&"tests/test_api.py".to_string()));
    }

    #[test]
    fn test_path_matching_requires_component_boundary() {
        assert!(path_matches("src/lib.rs", "src/lib.rs"));
        assert!(path_matches("/home/ci/work/repo/src/lib.rs", "src/lib.rs"));
        assert!(!path_matches("mysrc/lib.rs", "src/lib.rs"));
        assert!(!path_matches("src/lib.rs.bak", "src/lib.rs"));
    }

    #[test]
    fn test_failure_referencing_changed_file_is_in_scope() {
        let check = Check::new("unit", CheckStatus::Failure)
            .with_log("thread 'main' panicked at src/parser.rs:42:9");
        let triage = classify_failure(&check, &files(&["src/parser.rs", "README.md"]));
        assert_eq!(triage.triage, Triage::InScope);
        assert_eq!(triage.referenced_files, files(&["src/parser.rs"]));
    }

    #[test]
    fn test_failure_without_changed_file_is_out_of_scope() {
        let check = Check::new("e2e", CheckStatus::Failure)
            .with_log("timeout in tests/e2e/login.spec.ts:12");
        let triage = classify_failure(&check, &files(&["src/parser.rs"]));
        assert_eq!(triage.triage, Triage::OutOfScope);
        assert!(triage.referenced_files.is_empty());
    }

    #[test]
    fn test_follow_up_carries_project_and_excerpt() {
        let change = ChangeRequest::new("pr-5", "feature/a", "main");
        let check = Check::new("e2e", CheckStatus::Failure).with_log("boom in vendor/x.js");
        let follow_up = follow_up_for(&check, &change, Some("Platform"));
        assert_eq!(follow_up.project.as_deref(), Some("Platform"));
        assert!(follow_up.title.contains("e2e"));
        assert!(follow_up.body.contains("boom in vendor/x.js"));
        assert!(follow_up.body.contains("pr-5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_polls_until_terminal() {
        let ci = Arc::new(FakeCi::new());
        ci.push_poll(vec![Check::new("build", CheckStatus::InProgress)]);
        ci.push_poll(vec![Check::new("build", CheckStatus::Success)]);
        let monitor = CiMonitor::new(ci.clone(), RetryPolicy::none(), Duration::from_secs(30));
        let change = ChangeRequest::new("pr-1", "a", "main");
        let run = monitor
            .await_completion(&change, Duration::from_secs(600))
            .await
            .unwrap();
        assert!(run.is_complete());
        assert_eq!(ci.poll_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_completion_times_out() {
        let ci = Arc::new(FakeCi::new());
        ci.set_default(vec![Check::new("build", CheckStatus::Queued)]);
        let monitor = CiMonitor::new(ci, RetryPolicy::none(), Duration::from_secs(30));
        let change = ChangeRequest::new("pr-2", "a", "main");
        let err = monitor
            .await_completion(&change, Duration::from_secs(120))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::CiTimeout { waited_secs: 120, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_faults_retry_then_surface() {
        let ci = Arc::new(FakeCi::new());
        ci.fail_next(10);
        let monitor = CiMonitor::new(ci.clone(), RetryPolicy::default(), Duration::from_secs(30));
        let change = ChangeRequest::new("pr-3", "a", "main");
        let err = monitor
            .await_completion(&change, Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::TransientInfra { attempts: 4, .. }));
        assert_eq!(ci.poll_count(), 4);
    }

    #[test]
    fn test_triage_covers_only_failed_checks() {
        let ci = Arc::new(FakeCi::new());
        let monitor = CiMonitor::new(ci, RetryPolicy::none(), Duration::from_secs(1));
        let change = ChangeRequest::new("pr-4", "a", "main");
        let mut run = CiRun::from_checks(vec![
            Check::new("lint", CheckStatus::Success).with_log("src/a.rs ok"),
            Check::new("unit", CheckStatus::Failure).with_log("src/a.rs:1: fail"),
        ]);
        monitor.triage(&change, &mut run, &files(&["src/a.rs"]));
        assert_eq!(run.triage.len(), 1);
        assert!(run.has_in_scope_failures());
    }
}
