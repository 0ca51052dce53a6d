//! reviewgate - change-request quality gate CLI
//!
//! Operator commands over the gate's building blocks.
//!
//! ## Commands
//!
//! - `classify`: classify the conflict regions of a file with merge markers
//! - `detect`: trial-merge two refs and classify every conflict
//! - `resolve`: auto-resolve conflicts between two refs when all are simple
//! - `commits`: check commit messages against the conventional format
//! - `ci`: run local checks and triage failures against changed files
//! - `audit`: print the audit trail of a change request
//! - `config`: print the effective configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use reviewgate_ci::{BuiltinCheck, CheckConfig, LocalCiService};
use reviewgate_core::conflict::extract_hunks;
use reviewgate_core::git::{diff_against, list_commits};
use reviewgate_core::{
    follow_up_for, parse_unified_diff, read_audit_trail, AuditLedger, ChangeRequest,
    ChangeRequestId, CiMonitor, CommitFormat, CommitInfo, ConflictClassifier, ConflictDetector,
    ConflictResolver, ConflictedFile, Detection, FsAuditLedger, GateConfig, GitMergeWorkspace,
    IterationRecord, RegionSummary, ResolveOutcome, ReviewFinding, Triage, METRICS,
};

#[derive(Parser)]
#[command(name = "reviewgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Change-request quality gate: CI triage, conflict resolution, review", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Gate configuration file (JSON); environment overrides apply otherwise
    #[arg(long, global = true, env = "REVIEWGATE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the conflict regions of a file containing merge markers
    Classify {
        /// File with `<<<<<<<` / `=======` / `>>>>>>>` markers
        file: PathBuf,

        /// Repository-relative path used for import and lockfile rules
        /// (default: the file path as given)
        #[arg(long)]
        path: Option<String>,
    },

    /// Trial-merge target into source and classify every conflict
    Detect {
        /// Source branch of the change
        source: String,

        /// Target branch the change merges into
        #[arg(short, long, default_value = "main")]
        target: String,

        /// Repository path
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Commit an auto-resolution when every conflict is simple
    Resolve {
        /// Source branch of the change (must not be checked out)
        source: String,

        #[arg(short, long, default_value = "main")]
        target: String,

        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Check commit messages in a range against the conventional format
    Commits {
        /// Revision range to check
        #[arg(default_value = "main..HEAD")]
        range: String,

        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Run local checks and triage failures
    Ci {
        /// Working directory the checks run in
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Check as `name=command args...` (repeatable; default: fmt, clippy, test)
        #[arg(long = "check")]
        checks: Vec<String>,

        /// Per-check timeout in seconds
        #[arg(long, default_value = "1200")]
        timeout_secs: u64,

        /// Changed file (repeatable)
        #[arg(long = "changed")]
        changed: Vec<String>,

        /// Derive changed files from the diff against this ref instead
        #[arg(long, conflicts_with = "changed")]
        against: Option<String>,
    },

    /// Print the audit trail of a change request
    Audit {
        /// Change request id
        change_request: String,

        /// Audit ledger directory
        #[arg(long, env = "REVIEWGATE_LEDGER_DIR", default_value = ".reviewgate/audit")]
        ledger_dir: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    reviewgate_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;
    let format = cli.output;

    let result = match cli.command {
        Commands::Classify { file, path } => cmd_classify(&config, &file, path, format),
        Commands::Detect {
            source,
            target,
            repo,
        } => cmd_detect(&config, &repo, &source, &target, format).await,
        Commands::Resolve {
            source,
            target,
            repo,
        } => cmd_resolve(&config, &repo, &source, &target, format).await,
        Commands::Commits { range, repo } => cmd_commits(&config, &repo, &range, format),
        Commands::Ci {
            workdir,
            checks,
            timeout_secs,
            changed,
            against,
        } => {
            cmd_ci(
                &config,
                &workdir,
                &checks,
                timeout_secs,
                changed,
                against.as_deref(),
                format,
            )
            .await
        }
        Commands::Audit {
            change_request,
            ledger_dir,
        } => cmd_audit(&ledger_dir, &change_request, format).await,
        Commands::Config => print_json(&config),
    };

    METRICS.flush();
    result
}

fn load_config(path: Option<&Path>) -> Result<GateConfig> {
    let config = match path {
        Some(path) => GateConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => GateConfig::from_env().context("Invalid REVIEWGATE_* environment")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// snake_case label of a serde enum.
fn label<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "unknown".to_string(),
    }
}

// ----- Conflicts -----

fn classifier(config: &GateConfig) -> ConflictClassifier {
    ConflictClassifier::new(config.lockfile_names.clone())
}

/// Regions of one marker-annotated file.
fn classify_text(classifier: &ConflictClassifier, path: &str, bytes: &[u8]) -> Vec<RegionSummary> {
    let (merged, binary) = match std::str::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => (text.to_string(), false),
        _ => (String::new(), true),
    };
    // Both sides exist; their text comes from the markers.
    let file = ConflictedFile {
        path: path.to_string(),
        ours: Some(String::new()),
        theirs: Some(String::new()),
        merged: Some(merged),
        binary,
    };
    extract_hunks(&file)
        .into_iter()
        .map(|hunk| RegionSummary::from(&classifier.classify(hunk)))
        .collect()
}

fn render_regions(regions: &[RegionSummary]) -> String {
    let mut out = String::new();
    for region in regions {
        let strategy = region
            .strategy
            .as_ref()
            .map(label)
            .unwrap_or_else(|| "needs human".to_string());
        out.push_str(&format!(
            "  {:<40} {:<20} {}\n",
            region.path,
            region.category.to_string(),
            strategy
        ));
    }
    let simple = regions.iter().filter(|r| r.category.is_simple()).count();
    out.push_str(&format!(
        "\n{} region(s), {} simple, {} complex\n",
        regions.len(),
        simple,
        regions.len() - simple
    ));
    out
}

fn cmd_classify(
    config: &GateConfig,
    file: &Path,
    path: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let path = path.unwrap_or_else(|| file.to_string_lossy().into_owned());
    let regions = classify_text(&classifier(config), &path, &bytes);
    match format {
        OutputFormat::Json => print_json(&regions),
        OutputFormat::Text => {
            print!("{}", render_regions(&regions));
            Ok(())
        }
    }
}

fn detector_for(config: &GateConfig, repo: &Path) -> (ConflictDetector, ConflictResolver) {
    let workspace = Arc::new(GitMergeWorkspace::new(repo));
    (
        ConflictDetector::new(workspace.clone(), classifier(config)),
        ConflictResolver::new(workspace),
    )
}

async fn cmd_detect(
    config: &GateConfig,
    repo: &Path,
    source: &str,
    target: &str,
    format: OutputFormat,
) -> Result<()> {
    let (detector, _) = detector_for(config, repo);
    let detection = detector
        .detect(source, target)
        .await
        .with_context(|| format!("Trial merge of {target} into {source} failed"))?;
    let regions: Vec<RegionSummary> = match &detection {
        Detection::NoConflicts => Vec::new(),
        Detection::Conflicts(set) => set.regions.iter().map(RegionSummary::from).collect(),
    };
    match format {
        OutputFormat::Json => print_json(&regions),
        OutputFormat::Text if regions.is_empty() => {
            println!("✓ {source} merges cleanly with {target}");
            Ok(())
        }
        OutputFormat::Text => {
            println!("Conflicts merging {target} into {source}:");
            print!("{}", render_regions(&regions));
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct ResolveOutput {
    resolved: bool,
    commit: Option<String>,
    regenerate: Vec<String>,
    applied: Vec<RegionSummary>,
    unresolved: Vec<RegionSummary>,
}

async fn cmd_resolve(
    config: &GateConfig,
    repo: &Path,
    source: &str,
    target: &str,
    format: OutputFormat,
) -> Result<()> {
    let (detector, resolver) = detector_for(config, repo);
    let set = match detector.detect(source, target).await? {
        Detection::NoConflicts => {
            println!("✓ {source} merges cleanly with {target}; nothing to resolve");
            return Ok(());
        }
        Detection::Conflicts(set) => set,
    };
    let output = match resolver.resolve(&set).await.context("Resolution failed")? {
        ResolveOutcome::Resolved(merged) => ResolveOutput {
            resolved: true,
            commit: Some(merged.commit),
            regenerate: merged.regenerate,
            applied: merged.applied,
            unresolved: Vec::new(),
        },
        ResolveOutcome::PartialEscalation {
            resolved,
            unresolved,
        } => ResolveOutput {
            resolved: false,
            commit: None,
            regenerate: Vec::new(),
            applied: resolved.iter().map(RegionSummary::from).collect(),
            unresolved: unresolved.iter().map(RegionSummary::from).collect(),
        },
    };
    info!(resolved = output.resolved, source = %source, target = %target, "resolve finished");

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            if let Some(commit) = &output.commit {
                println!("✓ Resolved {} region(s) in {commit}", output.applied.len());
                for path in &output.regenerate {
                    println!("  regenerate lock artifact: {path}");
                }
            } else {
                println!("✗ Nothing committed; complex regions need a human:");
                print!("{}", render_regions(&output.unresolved));
            }
        }
    }
    if output.resolved {
        Ok(())
    } else {
        anyhow::bail!("{} conflict region(s) require human resolution", output.unresolved.len())
    }
}

// ----- Commits -----

fn commit_findings(config: &GateConfig, commits: &[CommitInfo]) -> Result<Vec<ReviewFinding>> {
    let format = CommitFormat::new(&config.commit_types, config.require_commit_scope)
        .context("Invalid commit type configuration")?;
    Ok(format.check(commits))
}

fn cmd_commits(config: &GateConfig, repo: &Path, range: &str, format: OutputFormat) -> Result<()> {
    let commits = list_commits(repo, range)
        .with_context(|| format!("Failed to list commits in {range}"))?;
    let findings = commit_findings(config, &commits)?;
    match format {
        OutputFormat::Json => print_json(&findings)?,
        OutputFormat::Text => {
            for finding in &findings {
                println!("  ✗ {}", finding.message);
            }
            println!(
                "\n{} commit(s) checked, {} malformed",
                commits.len(),
                findings.len()
            );
        }
    }
    if findings.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("commit messages do not follow the conventional format")
    }
}

// ----- Local CI -----

fn check_configs(specs: &[String], timeout_secs: u64) -> Result<Vec<CheckConfig>> {
    if specs.is_empty() {
        return Ok(BuiltinCheck::ALL
            .iter()
            .map(|check| CheckConfig::from_builtin(*check, timeout_secs))
            .collect());
    }
    specs
        .iter()
        .map(|spec| {
            CheckConfig::parse(spec, timeout_secs)
                .with_context(|| format!("Invalid check {spec:?}; expected name=command"))
        })
        .collect()
}

fn changed_files(workdir: &Path, changed: Vec<String>, against: Option<&str>) -> Result<Vec<String>> {
    let Some(target) = against else {
        return Ok(changed);
    };
    let diff = diff_against(workdir, target, "HEAD")
        .with_context(|| format!("Failed to diff HEAD against {target}"))?;
    Ok(parse_unified_diff(&diff)
        .context("Failed to parse diff")?
        .into_iter()
        .map(|file| file.path)
        .collect())
}

#[derive(Serialize)]
struct CiOutput {
    status: String,
    checks: Vec<CheckLine>,
    follow_ups: Vec<String>,
}

#[derive(Serialize)]
struct CheckLine {
    name: String,
    status: String,
    triage: Option<String>,
    referenced_files: Vec<String>,
}

async fn cmd_ci(
    config: &GateConfig,
    workdir: &Path,
    specs: &[String],
    timeout_secs: u64,
    changed: Vec<String>,
    against: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let checks = check_configs(specs, timeout_secs)?;
    let changed = changed_files(workdir, changed, against)?;
    let service = LocalCiService::new(workdir, checks);
    let monitor = CiMonitor::new(
        Arc::new(service),
        config.retry.clone(),
        config.ci_poll_interval(),
    );
    let change = ChangeRequest::new("local", "HEAD", against.unwrap_or("main"));

    let mut run = monitor
        .await_completion(&change, Duration::from_secs(timeout_secs.max(1)) * 2)
        .await
        .context("Local checks did not complete")?;
    monitor.triage(&change, &mut run, &changed);

    let lines: Vec<CheckLine> = run
        .checks
        .iter()
        .map(|check| {
            let triage = run.triage.iter().find(|t| t.check == check.name);
            CheckLine {
                name: check.name.clone(),
                status: label(&check.status),
                triage: triage.map(|t| label(&t.triage)),
                referenced_files: triage.map(|t| t.referenced_files.clone()).unwrap_or_default(),
            }
        })
        .collect();
    let follow_ups: Vec<String> = run
        .out_of_scope()
        .filter_map(|t| run.checks.iter().find(|c| c.name == t.check))
        .map(|check| follow_up_for(check, &change, config.project.as_deref()).title)
        .collect();
    let output = CiOutput {
        status: label(&run.status),
        checks: lines,
        follow_ups,
    };

    match format {
        OutputFormat::Json => print_json(&output)?,
        OutputFormat::Text => {
            for line in &output.checks {
                let mark = if line.status == "success" || line.status == "skipped" {
                    "✓"
                } else {
                    "✗"
                };
                let triage = match &line.triage {
                    Some(t) => format!(" [{t}: {}]", line.referenced_files.join(", ")),
                    None => String::new(),
                };
                println!("  {mark} {} ({}){triage}", line.name, line.status);
            }
            for title in &output.follow_ups {
                println!("  follow-up: {title}");
            }
        }
    }

    if run.triage.iter().any(|t| t.triage == Triage::InScope) {
        anyhow::bail!("checks failed in changed code")
    }
    Ok(())
}

// ----- Audit -----

fn render_trail(id: &str, trail: &[IterationRecord], sealed: Option<&str>) -> String {
    let mut out = format!("Audit trail for {id}\n");
    for record in trail {
        out.push_str(&format!(
            "  #{} {:<18} {:>3} finding(s)  ci={:<8} conflicts={}  {}\n",
            record.iteration,
            record.verdict.to_string(),
            record.findings.len(),
            label(&record.ci.status),
            label(&record.conflicts.outcome),
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        ));
        for finding in record.findings.iter() {
            let location = finding
                .location()
                .map(|l| format!(" ({l})"))
                .unwrap_or_default();
            out.push_str(&format!(
                "      [{}] {}{location}: {}\n",
                finding.severity, finding.dimension, finding.message
            ));
        }
    }
    match sealed {
        Some(status) => out.push_str(&format!("Sealed: {status}\n")),
        None => out.push_str("Open\n"),
    }
    out
}

async fn cmd_audit(ledger_dir: &Path, change_request: &str, format: OutputFormat) -> Result<()> {
    let ledger = FsAuditLedger::new(ledger_dir);
    let id = ChangeRequestId::from(change_request);
    let trail = read_audit_trail(&ledger, &id)
        .await
        .with_context(|| format!("Failed to read audit trail for {change_request}"))?;
    let sealed = ledger
        .archive_summary(id.as_str())
        .await
        .context("Failed to read archive summary")?
        .map(|s| s.terminal_status);
    match format {
        OutputFormat::Json => print_json(&trail),
        OutputFormat::Text => {
            print!("{}", render_trail(change_request, &trail, sealed.as_deref()));
            Ok(())
        }
    }
}
