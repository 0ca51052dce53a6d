//! Coordinator configuration.
//!
//! `GateConfig` is built once and handed to the coordinator at construction;
//! nothing reads process environment after that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{GateError, GateResult, DEFAULT_MAX_ITERATIONS};
use crate::retry::RetryPolicy;

pub const ENV_MAX_ITERATIONS: &str = "REVIEWGATE_MAX_ITERATIONS";
pub const ENV_CI_TIMEOUT_SECS: &str = "REVIEWGATE_CI_TIMEOUT_SECS";
pub const ENV_CI_POLL_INTERVAL_SECS: &str = "REVIEWGATE_CI_POLL_INTERVAL_SECS";
pub const ENV_PROJECT: &str = "REVIEWGATE_PROJECT";
pub const ENV_LOCK_DIR: &str = "REVIEWGATE_LOCK_DIR";

/// Generated dependency lock artifacts recognised out of the box.
pub const DEFAULT_LOCKFILE_NAMES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Gemfile.lock",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "go.sum",
    "mix.lock",
    "pubspec.lock",
    "Podfile.lock",
    "uv.lock",
    "bun.lockb",
    "flake.lock",
];

/// Conventional-commit types accepted by the commit format check.
pub const DEFAULT_COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// Review cycle configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Fix iterations allowed before escalation.
    pub max_iterations: u32,
    pub ci_timeout_secs: u64,
    pub ci_poll_interval_secs: u64,
    pub retry: RetryPolicy,
    /// Project association attached to follow-up work items.
    pub project: Option<String>,
    pub escalation_label: String,
    pub lockfile_names: Vec<String>,
    pub commit_types: Vec<String>,
    pub require_commit_scope: bool,
    /// Fraction of a criterion's keywords that must appear in the added lines.
    pub criterion_match_ratio: f64,
    /// Directory for cross-process advisory lock files. In-process only when unset.
    pub lock_dir: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            ci_timeout_secs: 1800,
            ci_poll_interval_secs: 30,
            retry: RetryPolicy::default(),
            project: None,
            escalation_label: "needs-human-review".to_string(),
            lockfile_names: DEFAULT_LOCKFILE_NAMES.iter().map(|s| s.to_string()).collect(),
            commit_types: DEFAULT_COMMIT_TYPES.iter().map(|s| s.to_string()).collect(),
            require_commit_scope: false,
            criterion_match_ratio: 0.5,
            lock_dir: None,
        }
    }
}

impl GateConfig {
    /// Defaults overridden by `REVIEWGATE_*` environment variables.
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `REVIEWGATE_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> GateResult<Self> {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_MAX_ITERATIONS) {
            config.max_iterations = parse_var(ENV_MAX_ITERATIONS, &v)?;
        }
        if let Some(v) = lookup(ENV_CI_TIMEOUT_SECS) {
            config.ci_timeout_secs = parse_var(ENV_CI_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_CI_POLL_INTERVAL_SECS) {
            config.ci_poll_interval_secs = parse_var(ENV_CI_POLL_INTERVAL_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_PROJECT).filter(|v| !v.trim().is_empty()) {
            config.project = Some(v);
        }
        if let Some(v) = lookup(ENV_LOCK_DIR).filter(|v| !v.trim().is_empty()) {
            config.lock_dir = Some(PathBuf::from(v));
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> GateResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| GateError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GateResult<()> {
        if self.max_iterations == 0 {
            return Err(GateError::Config("max_iterations must be at least 1".into()));
        }
        if self.ci_poll_interval_secs == 0 {
            return Err(GateError::Config("ci_poll_interval_secs must be positive".into()));
        }
        if self.ci_poll_interval_secs > self.ci_timeout_secs {
            return Err(GateError::Config(format!(
                "ci_poll_interval_secs ({}) exceeds ci_timeout_secs ({})",
                self.ci_poll_interval_secs, self.ci_timeout_secs
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(GateError::Config(
                "retry.base_delay_ms exceeds retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.criterion_match_ratio) {
            return Err(GateError::Config(
                "criterion_match_ratio must be within 0.0..=1.0".into(),
            ));
        }
        if self.commit_types.is_empty() {
            return Err(GateError::Config("commit_types must not be empty".into()));
        }
        Ok(())
    }

    pub fn ci_timeout(&self) -> Duration {
        Duration::from_secs(self.ci_timeout_secs)
    }

    pub fn ci_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ci_poll_interval_secs)
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_ci_timeout(mut self, timeout: Duration) -> Self {
        self.ci_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_ci_poll_interval(mut self, interval: Duration) -> Self {
        self.ci_poll_interval_secs = interval.as_secs();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_project(mut self, project: &str) -> Self {
        self.project = Some(project.to_string());
        self
    }

    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    pub fn with_require_commit_scope(mut self, required: bool) -> Self {
        self.require_commit_scope = required;
        self
    }

    /// Whether `path`'s file name is a known lock artifact.
    pub fn is_lockfile(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.lockfile_names.iter().any(|l| l == name)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> GateResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| GateError::Config(format!("{key}: cannot parse {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = GateConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.escalation_label, "needs-human-review");
        assert!(config.is_lockfile("web/package-lock.json"));
        assert!(config.is_lockfile("Cargo.lock"));
        assert!(!config.is_lockfile("src/lock.rs"));
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MAX_ITERATIONS, "5"),
            (ENV_CI_TIMEOUT_SECS, "600"),
            (ENV_PROJECT, "Platform"),
        ]
        .into_iter()
        .collect();
        let config = GateConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.ci_timeout_secs, 600);
        assert_eq!(config.project.as_deref(), Some("Platform"));
        assert_eq!(config.ci_poll_interval_secs, 30);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = GateConfig::from_lookup(|k| {
            (k == ENV_MAX_ITERATIONS).then(|| "three".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, GateError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_iterations_and_bad_poll() {
        assert!(GateConfig::default().with_max_iterations(0).validate().is_err());
        let config = GateConfig::default()
            .with_ci_timeout(Duration::from_secs(10))
            .with_ci_poll_interval(Duration::from_secs(20));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.json");
        std::fs::write(&path, r#"{ "max_iterations": 2, "project": "Core" }"#).unwrap();
        let config = GateConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.project.as_deref(), Some("Core"));
        assert_eq!(config.ci_timeout_secs, 1800);
        assert_eq!(config.lockfile_names.len(), DEFAULT_LOCKFILE_NAMES.len());
    }
}
