//! Check execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use reviewgate_core::{Check, CheckStatus};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::check::CheckConfig;

/// Result of running one check command.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub name: String,

    /// Exit code, or -1 when killed or terminated by a signal.
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// Combined output, stderr first: compilers and test runners put the
    /// failure location there.
    pub fn log(&self) -> String {
        let mut log = self.stderr.clone();
        if !log.is_empty() && !log.ends_with('\n') {
            log.push('\n');
        }
        log.push_str(&self.stdout);
        log
    }

    pub fn into_check(self) -> Check {
        let status = if self.passed() {
            CheckStatus::Success
        } else {
            CheckStatus::Failure
        };
        let log = self.log();
        Check::new(self.name, status).with_log(log)
    }
}

/// Runs check commands in a working directory.
pub struct CheckRunner;

impl CheckRunner {
    /// Execute one check. A timeout is a failed check, not an error; spawn
    /// failures are errors.
    pub async fn execute(config: &CheckConfig, workdir: &Path) -> anyhow::Result<CheckOutcome> {
        let start = Instant::now();

        let Some((exe, args)) = config.command.split_first() else {
            anyhow::bail!("check {} has empty command", config.name);
        };

        let child = Command::new(exe)
            .args(args)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to spawn check {} ({exe}): {e}", config.name))?;

        let waited = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
        } else {
            Ok(child.wait_with_output().await)
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let output = match waited {
            Ok(output) => output?,
            Err(_) => {
                warn!(check = %config.name, timeout_secs = config.timeout_secs, "check timed out");
                return Ok(CheckOutcome {
                    name: config.name.clone(),
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!(
                        "check {} timed out after {} seconds",
                        config.name, config.timeout_secs
                    ),
                    duration_ms,
                    timed_out: true,
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(check = %config.name, exit_code, duration_ms, "check finished");
        Ok(CheckOutcome {
            name: config.name.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms,
            timed_out: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: i32, stdout: &str, stderr: &str) -> CheckOutcome {
        CheckOutcome {
            name: "unit".to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration_ms: 100,
            timed_out: false,
        }
    }

    #[test]
    fn test_outcome_passed() {
        assert!(outcome(0, "", "").passed());
        assert!(!outcome(1, "", "error").passed());
    }

    #[test]
    fn test_log_puts_stderr_first() {
        let log = outcome(1, "test result: FAILED", "src/lib.rs:3:1: error").log();
        assert_eq!(log, "src/lib.rs:3:1: error\ntest result: FAILED");
    }

    #[test]
    fn test_into_check_maps_status() {
        let check = outcome(2, "", "boom").into_check();
        assert_eq!(check.name, "unit");
        assert_eq!(check.status, CheckStatus::Failure);
        assert_eq!(check.log, "boom\n");
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckConfig::custom("echo", vec!["echo".into(), "hello".into()], 60);
        let result = CheckRunner::execute(&config, dir.path()).await.unwrap();
        assert!(result.passed());
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckConfig::custom("false", vec!["false".into()], 60);
        let result = CheckRunner::execute(&config, dir.path()).await.unwrap();
        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_execute_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckConfig::custom("slow", vec!["sleep".into(), "5".into()], 1);
        let result = CheckRunner::execute(&config, dir.path()).await.unwrap();
        assert!(result.timed_out);
        assert!(!result.passed());
        assert!(result.stderr.contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn test_empty_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = CheckConfig::custom("empty", Vec::new(), 60);
        assert!(CheckRunner::execute(&config, dir.path()).await.is_err());
    }
}
