//! Three-way conflict marker parsing.
//!
//! Understands the default two-way style and the diff3 style with a
//! `|||||||` base section. `ours` is the checked-out side (the change's
//! source branch), `theirs` the merged-in side (the target branch).

const OURS_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SEPARATOR: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>>";

/// A piece of a conflicted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text git merged without conflict.
    Clean(String),
    Conflict {
        ours: String,
        base: Option<String>,
        theirs: String,
    },
}

/// Why a conflicted file could not be split into segments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    #[error("no conflict markers found")]
    NoMarkers,
    #[error("unexpected {marker} marker at line {line}")]
    Unexpected { marker: &'static str, line: usize },
    #[error("conflict opened at line {line} is never closed")]
    Unterminated { line: usize },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Clean,
    Ours,
    Base,
    Theirs,
}

fn is_marker(line: &str, marker: &str) -> bool {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.strip_prefix(marker) {
        Some(rest) => rest.is_empty() || rest.starts_with(' '),
        None => false,
    }
}

/// Split a conflicted file into clean text and conflict segments.
///
/// Line terminators are preserved, so concatenating every segment with
/// one side chosen per conflict reproduces a well-formed file.
pub fn split_conflicts(text: &str) -> Result<Vec<Segment>, MarkerError> {
    let mut segments = Vec::new();
    let mut state = State::Clean;
    let mut clean = String::new();
    let mut ours = String::new();
    let mut base: Option<String> = None;
    let mut theirs = String::new();
    let mut opened_at = 0;
    let mut conflicts = 0;

    for (idx, line) in text.split_inclusive('\n').enumerate() {
        let lineno = idx + 1;
        match state {
            // A separator outside an open conflict is ordinary text,
            // e.g. a Markdown setext underline.
            State::Clean => {
                if is_marker(line, OURS_MARKER) {
                    if !clean.is_empty() {
                        segments.push(Segment::Clean(std::mem::take(&mut clean)));
                    }
                    state = State::Ours;
                    opened_at = lineno;
                } else if is_marker(line, THEIRS_MARKER) {
                    return Err(MarkerError::Unexpected {
                        marker: THEIRS_MARKER,
                        line: lineno,
                    });
                } else {
                    clean.push_str(line);
                }
            }
            State::Ours | State::Base => {
                if is_marker(line, BASE_MARKER) && state == State::Ours {
                    base = Some(String::new());
                    state = State::Base;
                } else if line.trim_end_matches(['\r', '\n']) == SEPARATOR {
                    state = State::Theirs;
                } else if is_marker(line, OURS_MARKER) || is_marker(line, THEIRS_MARKER) {
                    return Err(MarkerError::Unexpected {
                        marker: if is_marker(line, OURS_MARKER) {
                            OURS_MARKER
                        } else {
                            THEIRS_MARKER
                        },
                        line: lineno,
                    });
                } else if state == State::Ours {
                    ours.push_str(line);
                } else if let Some(b) = base.as_mut() {
                    b.push_str(line);
                }
            }
            State::Theirs => {
                if is_marker(line, THEIRS_MARKER) {
                    segments.push(Segment::Conflict {
                        ours: std::mem::take(&mut ours),
                        base: base.take(),
                        theirs: std::mem::take(&mut theirs),
                    });
                    conflicts += 1;
                    state = State::Clean;
                } else if is_marker(line, OURS_MARKER) {
                    return Err(MarkerError::Unexpected {
                        marker: OURS_MARKER,
                        line: lineno,
                    });
                } else {
                    theirs.push_str(line);
                }
            }
        }
    }

    if state != State::Clean {
        return Err(MarkerError::Unterminated { line: opened_at });
    }
    if conflicts == 0 {
        return Err(MarkerError::NoMarkers);
    }
    if !clean.is_empty() {
        segments.push(Segment::Clean(clean));
    }
    Ok(segments)
}

/// Rebuild a file taking the target branch's side of every conflict.
pub fn take_theirs(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Clean(text) => out.push_str(text),
            Segment::Conflict { theirs, .. } => out.push_str(theirs),
        }
    }
    out
}

/// Whether `text` still contains an opening conflict marker line.
pub fn has_markers(text: &str) -> bool {
    text.lines().any(|l| is_marker(l, OURS_MARKER))
}
