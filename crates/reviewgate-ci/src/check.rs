//! Local CI check definitions and configuration.

use serde::{Deserialize, Serialize};

/// Builtin checks for Rust workspaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinCheck {
    /// cargo fmt --all -- --check
    CargoFmt,

    /// cargo clippy --workspace --all-targets -- -D warnings
    CargoClippy,

    /// cargo test --workspace
    CargoTest,
}

impl BuiltinCheck {
    pub const ALL: [BuiltinCheck; 3] = [
        BuiltinCheck::CargoFmt,
        BuiltinCheck::CargoClippy,
        BuiltinCheck::CargoTest,
    ];

    /// Check name as reported to the coordinator.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinCheck::CargoFmt => "fmt",
            BuiltinCheck::CargoClippy => "clippy",
            BuiltinCheck::CargoTest => "test",
        }
    }

    pub fn command(&self) -> Vec<String> {
        let args: &[&str] = match self {
            BuiltinCheck::CargoFmt => &["cargo", "fmt", "--all", "--", "--check"],
            BuiltinCheck::CargoClippy => &[
                "cargo",
                "clippy",
                "--workspace",
                "--all-targets",
                "--",
                "-D",
                "warnings",
            ],
            BuiltinCheck::CargoTest => &["cargo", "test", "--workspace"],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

/// One command-backed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConfig {
    pub name: String,

    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Per-check timeout in seconds; 0 disables it.
    pub timeout_secs: u64,

    /// Disabled checks are reported as `Skipped`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl CheckConfig {
    pub fn from_builtin(check: BuiltinCheck, timeout_secs: u64) -> Self {
        Self {
            name: check.name().to_string(),
            command: check.command(),
            timeout_secs,
            enabled: true,
        }
    }

    pub fn custom(name: impl Into<String>, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            command,
            timeout_secs,
            enabled: true,
        }
    }

    /// Parse `name=command args...`, the form used on the command line.
    pub fn parse(spec: &str, timeout_secs: u64) -> Option<Self> {
        let (name, command) = spec.split_once('=')?;
        let command: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if name.trim().is_empty() || command.is_empty() {
            return None;
        }
        Some(Self::custom(name.trim(), command, timeout_secs))
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
