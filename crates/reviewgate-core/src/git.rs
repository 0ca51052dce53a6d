//! Git integration: repository state and the worktree-backed merge workspace.
//!
//! Trial merges run in a throw-away detached worktree under a temp
//! directory, so the caller's checkout, index and refs are never touched.
//! The worktree is removed on every exit path by [`ScratchWorktree`]'s
//! `Drop`.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::collaborators::{
    ConflictedFile, FileResolution, MergeWorkspace, ResolutionAction, TrialMerge,
};
use crate::domain::{GateError, GateResult};

/// Capture the HEAD commit SHA from a git repository.
pub fn capture_head_sha(repo_dir: &Path) -> GateResult<String> {
    rev_parse(repo_dir, "HEAD")
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Commit subjects and merge flags for `range` (e.g. `main..feature`), oldest first.
pub fn list_commits(repo_dir: &Path, range: &str) -> GateResult<Vec<crate::collaborators::CommitInfo>> {
    // Fields separated by 0x1f, records by 0x1e.
    let out = git_ok(
        repo_dir,
        &["log", "--reverse", "--format=%H%x1f%P%x1f%B%x1e", range],
    )?;
    Ok(out
        .split('\u{1e}')
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            let mut fields = record.splitn(3, '\u{1f}');
            let sha = fields.next()?.trim();
            let parents = fields.next()?;
            let message = fields.next()?.trim_end();
            if sha.is_empty() {
                return None;
            }
            let mut commit = crate::collaborators::CommitInfo::new(sha, message);
            commit.is_merge = parents.split_whitespace().count() > 1;
            Some(commit)
        })
        .collect())
}

/// Unified diff between the merge base of `target` and `source`, and `source`.
pub fn diff_against(repo_dir: &Path, target: &str, source: &str) -> GateResult<String> {
    let range = format!("{target}...{source}");
    let output = git(repo_dir, &["diff", "--no-color", "--no-ext-diff", &range])?;
    if !output.status.success() {
        return Err(git_failure(&["diff", &range], &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn git(dir: &Path, args: &[&str]) -> GateResult<Output> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| GateError::Git(format!("failed to run git: {e}")))
}

fn git_failure(args: &[&str], output: &Output) -> GateError {
    GateError::Git(format!(
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

fn git_ok(dir: &Path, args: &[&str]) -> GateResult<String> {
    let output = git(dir, args)?;
    if !output.status.success() {
        return Err(git_failure(args, &output));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn rev_parse(dir: &Path, rev: &str) -> GateResult<String> {
    let spec = format!("{rev}^{{commit}}");
    let sha = git_ok(dir, &["rev-parse", "--verify", "--quiet", &spec])
        .map_err(|_| GateError::Git(format!("unknown revision {rev}")))?
        .trim()
        .to_string();
    if sha.is_empty() {
        return Err(GateError::Git(format!("unknown revision {rev}")));
    }
    Ok(sha)
}

/// A detached worktree that is force-removed when dropped.
struct ScratchWorktree {
    repo: PathBuf,
    path: PathBuf,
    _dir: tempfile::TempDir,
}

impl ScratchWorktree {
    fn create(repo: &Path, commit: &str) -> GateResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("reviewgate-merge-")
            .tempdir()?;
        let path = dir.path().join("wt");
        let path_str = path.to_string_lossy().into_owned();
        git_ok(repo, &["worktree", "add", "--detach", "--quiet", &path_str, commit])?;
        Ok(Self {
            repo: repo.to_path_buf(),
            path,
            _dir: dir,
        })
    }
}

impl Drop for ScratchWorktree {
    fn drop(&mut self) {
        let path = self.path.to_string_lossy().into_owned();
        if let Err(e) = git_ok(&self.repo, &["worktree", "remove", "--force", &path]) {
            warn!(event = "git.worktree_cleanup_failed", path = %path, error = %e);
        }
        let _ = git(&self.repo, &["worktree", "prune"]);
    }
}

/// Unmerged index entry: stage 1 base, 2 ours, 3 theirs.
struct UnmergedEntry {
    stage: u8,
    blob: String,
    path: String,
}

fn unmerged_entries(worktree: &Path) -> GateResult<Vec<UnmergedEntry>> {
    let out = git_ok(worktree, &["ls-files", "-u", "-z"])?;
    let mut entries = Vec::new();
    for record in out.split('\0').filter(|r| !r.is_empty()) {
        // "<mode> <blob> <stage>\t<path>"
        let Some((meta, path)) = record.split_once('\t') else {
            continue;
        };
        let mut parts = meta.split_whitespace();
        let (_mode, blob, stage) = match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(b), Some(s)) => (m, b, s),
            _ => continue,
        };
        entries.push(UnmergedEntry {
            stage: stage.parse().unwrap_or(0),
            blob: blob.to_string(),
            path: path.to_string(),
        });
    }
    Ok(entries)
}

fn read_blob(worktree: &Path, blob: &str) -> GateResult<Vec<u8>> {
    let output = git(worktree, &["cat-file", "blob", blob])?;
    if !output.status.success() {
        return Err(git_failure(&["cat-file", "blob", blob], &output));
    }
    Ok(output.stdout)
}

/// Text content, or `None` plus a binary flag for NUL/non-UTF-8 bytes.
fn decode(bytes: Vec<u8>) -> (Option<String>, bool) {
    if bytes.contains(&0) {
        return (Some(String::new()), true);
    }
    match String::from_utf8(bytes) {
        Ok(text) => (Some(text), false),
        Err(_) => (Some(String::new()), true),
    }
}

/// [`MergeWorkspace`] backed by a local git repository.
#[derive(Debug, Clone)]
pub struct GitMergeWorkspace {
    repo: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitMergeWorkspace {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self {
            repo: repo.into(),
            author_name: "reviewgate".to_string(),
            author_email: "reviewgate@localhost".to_string(),
        }
    }

    pub fn with_author(mut self, name: &str, email: &str) -> Self {
        self.author_name = name.to_string();
        self.author_email = email.to_string();
        self
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn identity_args(&self) -> [String; 4] {
        [
            "-c".to_string(),
            format!("user.name={}", self.author_name),
            "-c".to_string(),
            format!("user.email={}", self.author_email),
        ]
    }

    /// Start `merge --no-commit --no-ff` of `target` inside `worktree`.
    /// Returns whether the merge stopped on conflicts.
    fn start_merge(&self, worktree: &Path, target_sha: &str) -> GateResult<bool> {
        let identity = self.identity_args();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["merge", "--no-commit", "--no-ff", "--no-edit", target_sha]);
        let output = git(worktree, &args)?;
        let conflicted = !unmerged_entries(worktree)?.is_empty();
        if !output.status.success() && !conflicted {
            return Err(git_failure(&["merge", target_sha], &output));
        }
        Ok(conflicted)
    }

    fn trial_merge_blocking(&self, source_ref: &str, target_ref: &str) -> GateResult<TrialMerge> {
        let source = rev_parse(&self.repo, source_ref)?;
        let target = rev_parse(&self.repo, target_ref)?;
        let scratch = ScratchWorktree::create(&self.repo, &source)?;

        if !self.start_merge(&scratch.path, &target)? {
            debug!(source = %source_ref, target = %target_ref, "trial merge clean");
            return Ok(TrialMerge::Clean);
        }

        let entries = unmerged_entries(&scratch.path)?;
        let mut paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        paths.dedup();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let side = |stage: u8| -> GateResult<(Option<String>, bool)> {
                match entries.iter().find(|e| e.path == path && e.stage == stage) {
                    Some(entry) => Ok(decode(read_blob(&scratch.path, &entry.blob)?)),
                    None => Ok((None, false)),
                }
            };
            let (ours, ours_binary) = side(2)?;
            let (theirs, theirs_binary) = side(3)?;
            let (merged, merged_binary) = match std::fs::read(scratch.path.join(path)) {
                Ok(bytes) => decode(bytes),
                Err(_) => (None, false),
            };
            files.push(ConflictedFile {
                path: path.to_string(),
                ours,
                theirs,
                merged,
                binary: ours_binary || theirs_binary || merged_binary,
            });
        }
        Ok(TrialMerge::Conflicted(files))
    }

    fn commit_resolution_blocking(
        &self,
        source_ref: &str,
        target_ref: &str,
        resolutions: &[FileResolution],
    ) -> GateResult<String> {
        let branch = git_ok(&self.repo, &["rev-parse", "--symbolic-full-name", source_ref])?
            .trim()
            .to_string();
        if !branch.starts_with("refs/heads/") {
            return Err(GateError::Git(format!(
                "{source_ref} is not a local branch; cannot record a resolution on it"
            )));
        }
        let checked_out = git(&self.repo, &["symbolic-ref", "-q", "HEAD"])?;
        if String::from_utf8_lossy(&checked_out.stdout).trim() == branch {
            return Err(GateError::Git(format!(
                "{branch} is checked out in {}; switch away before resolving",
                self.repo.display()
            )));
        }

        let old = rev_parse(&self.repo, &branch)?;
        let target = rev_parse(&self.repo, target_ref)?;
        let scratch = ScratchWorktree::create(&self.repo, &old)?;
        let wt = scratch.path.as_path();
        self.start_merge(wt, &target)?;

        for resolution in resolutions {
            let path = resolution.path.as_str();
            match &resolution.action {
                ResolutionAction::Write(text) => {
                    std::fs::write(wt.join(path), text)?;
                    git_ok(wt, &["add", "--", path])?;
                }
                ResolutionAction::TakeTheirs => {
                    let has_theirs = unmerged_entries(wt)?
                        .iter()
                        .any(|e| e.path == path && e.stage == 3);
                    if has_theirs {
                        git_ok(wt, &["checkout", "--theirs", "--", path])?;
                        git_ok(wt, &["add", "--", path])?;
                    } else {
                        git_ok(wt, &["rm", "-q", "--force", "--ignore-unmatch", "--", path])?;
                    }
                }
            }
        }

        let remaining = unmerged_entries(wt)?;
        if !remaining.is_empty() {
            let mut paths: Vec<&str> = remaining.iter().map(|e| e.path.as_str()).collect();
            paths.dedup();
            return Err(GateError::Git(format!(
                "resolution left unmerged paths: {}",
                paths.join(", ")
            )));
        }

        let message = format!("chore(merge): resolve conflicts with {target_ref}");
        let identity = self.identity_args();
        let mut args: Vec<&str> = identity.iter().map(String::as_str).collect();
        args.extend(["commit", "--no-verify", "--quiet", "-m", &message]);
        git_ok(wt, &args)?;
        let new = rev_parse(wt, "HEAD")?;

        // Compare-and-swap: fails if the branch moved since we read it.
        git_ok(&self.repo, &["update-ref", &branch, &new, &old])?;
        debug!(branch = %branch, commit = %new, "resolution committed");
        Ok(new)
    }
}

async fn blocking<T, F>(f: F) -> GateResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> GateResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GateError::Git(format!("git task failed: {e}")))?
}

#[async_trait]
impl MergeWorkspace for GitMergeWorkspace {
    async fn trial_merge(&self, source_ref: &str, target_ref: &str) -> GateResult<TrialMerge> {
        let this = self.clone();
        let (source, target) = (source_ref.to_string(), target_ref.to_string());
        blocking(move || this.trial_merge_blocking(&source, &target)).await
    }

    async fn commit_resolution(
        &self,
        source_ref: &str,
        target_ref: &str,
        resolutions: &[FileResolution],
    ) -> GateResult<String> {
        let this = self.clone();
        let (source, target) = (source_ref.to_string(), target_ref.to_string());
        let resolutions = resolutions.to_vec();
        blocking(move || this.commit_resolution_blocking(&source, &target, &resolutions)).await
    }
}
