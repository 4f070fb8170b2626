//! Parsing and re-encoding of the agent's end-of-turn status handshake.
//!
//! Every coding-agent invocation must end its output with a block introduced
//! by the literal marker `PROGRAMMATOR_STATUS:` followed by an indented
//! mapping. The block may be wrapped in a triple-backtick fence; it always
//! terminates at the next fence or at end-of-input, whichever comes first.

use serde::{Deserialize, Serialize};
use std::fmt;

const MARKER: &str = "PROGRAMMATOR_STATUS:";

/// The `status:` field of a parsed handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Continue,
    Done,
    Blocked,
}

impl TaskStatus {
    fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Continue => "CONTINUE",
            TaskStatus::Done => "DONE",
            TaskStatus::Blocked => "BLOCKED",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CONTINUE" => Some(TaskStatus::Continue),
            "DONE" => Some(TaskStatus::Done),
            "BLOCKED" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The decoded handshake the agent reports at the end of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedStatus {
    pub phase_completed: Option<String>,
    pub status: Option<TaskStatus>,
    pub files_changed: Vec<String>,
    pub summary: String,
    pub error: Option<String>,
    pub commit_made: bool,
}

impl ParsedStatus {
    /// An unknown or missing `status:` value makes the block non-productive:
    /// the runner must treat it the way it treats a missing status block.
    pub fn is_valid(&self) -> bool {
        self.status.is_some()
    }
}

/// Find and decode the `PROGRAMMATOR_STATUS:` block in `output`, if present.
///
/// Returns `Ok(None)` when no marker is present (not an error — the caller
/// records a non-productive iteration). Returns `Err` only when the marker
/// was found but its body could not be decoded into well-formed YAML-ish
/// key/value pairs.
pub fn parse_status(output: &str) -> Result<Option<ParsedStatus>, String> {
    let Some(marker_pos) = output.find(MARKER) else {
        return Ok(None);
    };

    let after_marker = &output[marker_pos + MARKER.len()..];
    let body = match after_marker.find("```") {
        Some(fence_pos) => &after_marker[..fence_pos],
        None => after_marker,
    };

    let mut phase_completed: Option<String> = None;
    let mut status: Option<TaskStatus> = None;
    let mut files_changed: Vec<String> = Vec::new();
    let mut summary = String::new();
    let mut error: Option<String> = None;
    let mut commit_made = false;

    let mut lines = body.lines().peekable();
    while let Some(raw_line) = lines.next() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('-') {
            // A bare list item belonging to the previous `files_changed:` key.
            let value = unquote(rest.trim());
            if !value.is_empty() {
                files_changed.push(value);
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match key {
            "phase_completed" => {
                let v = unquote(value);
                phase_completed = if v.is_empty() || v == "null" || v == "~" {
                    None
                } else {
                    Some(v)
                };
            }
            "status" => {
                status = TaskStatus::parse(&unquote(value));
            }
            "files_changed" => {
                if value.is_empty() {
                    // Block-sequence form: items follow on subsequent lines.
                    continue;
                }
                if let Some(inline) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
                    for item in inline.split(',') {
                        let v = unquote(item.trim());
                        if !v.is_empty() {
                            files_changed.push(v);
                        }
                    }
                }
            }
            "summary" => {
                summary = unquote(value);
            }
            "error" => {
                let v = unquote(value);
                error = if v.is_empty() || v == "null" { None } else { Some(v) };
            }
            "commit_made" => {
                commit_made = matches!(unquote(value).to_lowercase().as_str(), "true" | "yes");
            }
            _ => {}
        }
    }

    if status.is_none() && phase_completed.is_none() && summary.is_empty() && files_changed.is_empty()
    {
        return Err("PROGRAMMATOR_STATUS block contained no recognizable fields".to_string());
    }

    Ok(Some(ParsedStatus {
        phase_completed,
        status,
        files_changed,
        summary,
        error,
        commit_made,
    }))
}

/// Re-encode a [`ParsedStatus`] into the documented wire form. Used by the
/// round-trip property test and by fixtures that simulate agent output.
pub fn encode_status(status: &ParsedStatus) -> String {
    let mut out = String::new();
    out.push_str(MARKER);
    out.push('\n');
    out.push_str(&format!(
        "  phase_completed: {}\n",
        match &status.phase_completed {
            Some(p) => format!("\"{}\"", p),
            None => "null".to_string(),
        }
    ));
    out.push_str(&format!(
        "  status: {}\n",
        status.status.map(|s| s.to_string()).unwrap_or_default()
    ));
    out.push_str("  files_changed:\n");
    for f in &status.files_changed {
        out.push_str(&format!("    - {}\n", f));
    }
    out.push_str(&format!("  summary: \"{}\"\n", status.summary));
    if let Some(err) = &status.error {
        out.push_str(&format!("  error: \"{}\"\n", err));
    }
    out.push_str(&format!("  commit_made: {}\n", status.commit_made));
    out
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}
