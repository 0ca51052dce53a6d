//! Unified diff parsing.
//!
//! Turns `git diff` output into per-file hunks with their added and removed
//! lines, so reviewers can reason about what a change actually touches.

use std::fmt;

use crate::domain::{GateError, GateResult};

/// One `@@` hunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    /// Added lines with their line number in the new file.
    pub added: Vec<(u32, String)>,
    pub removed: Vec<String>,
}

/// The diff of one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileDiff {
    /// Path in the new version (old path for deletions).
    pub path: String,
    pub old_path: Option<String>,
    pub is_new_file: bool,
    pub is_deleted_file: bool,
    pub is_rename: bool,
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    pub fn added_lines(&self) -> impl Iterator<Item = &str> {
        self.hunks
            .iter()
            .flat_map(|h| h.added.iter().map(|(_, l)| l.as_str()))
    }

    pub fn added_count(&self) -> usize {
        self.hunks.iter().map(|h| h.added.len()).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.hunks.iter().map(|h| h.removed.len()).sum()
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (+{} -{})",
            self.path,
            self.added_count(),
            self.removed_count()
        )
    }
}

/// Parse `git diff` output. Binary files are kept with `is_binary` set and
/// no hunks.
pub fn parse_unified_diff(input: &str) -> GateResult<Vec<FileDiff>> {
    let mut files = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut hunk: Option<Hunk> = None;
    let mut next_new_line = 0u32;

    for line in input.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            flush(&mut files, &mut current, &mut hunk);
            let mut file = FileDiff::default();
            // `a/x b/x`: good enough as a fallback when no ---/+++ headers follow.
            if let Some((_, b)) = rest.split_once(" b/") {
                file.path = b.trim_matches('"').to_string();
            }
            current = Some(file);
            continue;
        }

        // Plain patches without a `diff --git` line.
        if line.starts_with("--- ") && current.is_none() {
            current = Some(FileDiff::default());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            file.is_binary = true;
            continue;
        }
        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }
        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }
        if let Some(from) = line.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = Some(from.to_string());
            continue;
        }
        if let Some(to) = line.strip_prefix("rename to ") {
            file.is_rename = true;
            file.path = to.to_string();
            continue;
        }
        if hunk.is_none() {
            if let Some(path) = line.strip_prefix("--- ") {
                if let Some(p) = parse_path(path) {
                    file.old_path = Some(p);
                } else {
                    file.is_new_file = true;
                }
                continue;
            }
            if let Some(path) = line.strip_prefix("+++ ") {
                match parse_path(path) {
                    Some(p) => file.path = p,
                    None => {
                        file.is_deleted_file = true;
                        if let Some(old) = &file.old_path {
                            file.path = old.clone();
                        }
                    }
                }
                continue;
            }
        }

        if line.starts_with("@@ ") {
            if let Some(h) = hunk.take() {
                file.hunks.push(h);
            }
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            next_new_line = new_start;
            hunk = Some(Hunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                ..Hunk::default()
            });
            continue;
        }

        let Some(h) = hunk.as_mut() else {
            continue;
        };
        if let Some(added) = line.strip_prefix('+') {
            h.added.push((next_new_line, added.to_string()));
            next_new_line += 1;
        } else if let Some(removed) = line.strip_prefix('-') {
            h.removed.push(removed.to_string());
        } else if line.starts_with(' ') || line.is_empty() {
            next_new_line += 1;
        }
    }

    flush(&mut files, &mut current, &mut hunk);
    Ok(files)
}

fn flush(files: &mut Vec<FileDiff>, current: &mut Option<FileDiff>, hunk: &mut Option<Hunk>) {
    if let Some(mut file) = current.take() {
        if let Some(h) = hunk.take() {
            file.hunks.push(h);
        }
        if !file.path.is_empty() {
            files.push(file);
        }
    }
}

/// Strip `a/`/`b/` prefixes and quoting; `None` for `/dev/null`.
fn parse_path(raw: &str) -> Option<String> {
    // Some tools append a tab and timestamp after the path.
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim().trim_matches('"');
    if normalized == "/dev/null" {
        return None;
    }
    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);
    Some(stripped.to_string())
}

fn parse_hunk_header(line: &str) -> GateResult<(u32, u32, u32, u32)> {
    let invalid = || GateError::collaborator("diff", format!("invalid hunk header: {line}"));
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| s.find(" @@").map(|end| &s[..end]))
        .ok_or_else(invalid)?;

    let (old, new) = inner.split_once(' ').ok_or_else(invalid)?;
    let old = old.strip_prefix('-').ok_or_else(invalid)?;
    let new = new.strip_prefix('+').ok_or_else(invalid)?;
    let (old_start, old_lines) = parse_range(old).ok_or_else(invalid)?;
    let (new_start, new_lines) = parse_range(new).ok_or_else(invalid)?;
    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str) -> Option<(u32, u32)> {
    match range.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}
