//! Parsing and rewriting of markdown plan files.
//!
//! A plan file is `# Title` (or `# Plan: Title`), an optional
//! `## Validation Commands` section of backticked inline code items, and a
//! sequence of checkbox tasks (`- [ ] …` / `- [x] …` / `- [X] …`). Saving a
//! plan must preserve every non-task line byte-for-byte and flip only the
//! matched checkbox — the same "extract, don't rebuild" discipline the
//! teacher's fenced-block plan extraction uses for its JSON plans.

use crate::work_item::Phase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub title: String,
    pub phases: Vec<Phase>,
    pub validation_commands: Vec<String>,
    pub raw: String,
}

/// Parse a markdown plan file's contents.
pub fn parse_plan(content: &str) -> Plan {
    let mut title = String::new();
    let mut phases = Vec::new();
    let mut validation_commands = Vec::new();
    let mut in_validation_section = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("# ") {
            if title.is_empty() {
                title = rest.strip_prefix("Plan: ").unwrap_or(rest).trim().to_string();
            }
            in_validation_section = false;
            continue;
        }

        if trimmed.starts_with("## ") {
            in_validation_section = trimmed.to_lowercase().contains("validation");
            continue;
        }

        if in_validation_section {
            if let Some(start) = trimmed.find('`') {
                if let Some(end) = trimmed[start + 1..].find('`') {
                    validation_commands.push(trimmed[start + 1..start + 1 + end].to_string());
                    continue;
                }
            }
        }

        if let Some(task) = parse_checkbox_line(trimmed) {
            phases.push(task);
        }
    }

    Plan {
        title,
        phases,
        validation_commands,
        raw: content.to_string(),
    }
}

fn parse_checkbox_line(line: &str) -> Option<Phase> {
    let rest = line.strip_prefix("- [")?;
    let (marker, rest) = rest.split_once(']')?;
    let name = rest.trim().to_string();
    if name.is_empty() {
        return None;
    }
    let completed = matches!(marker, "x" | "X");
    Some(Phase { name, completed })
}

/// Find the checkbox line in `content` matching `phase_name` and flip it to
/// completed, preserving every other byte. Returns the new content plus
/// whether a match was found.
///
/// Matching strategy (in order): exact match, case-insensitive match,
/// reverse-contains after stripping a leading `"Task N:"` / `"Phase N:"` /
/// `"Step N:"` prefix from either side.
pub fn mark_phase_complete(content: &str, phase_name: &str) -> (String, bool) {
    let Some(matched_index) = find_matching_line_index(content, phase_name) else {
        return (content.to_string(), false);
    };

    let mut out = Vec::with_capacity(content.lines().count());
    for (i, line) in content.lines().enumerate() {
        if i == matched_index {
            out.push(flip_checkbox(line));
        } else {
            out.push(line.to_string());
        }
    }
    let mut rebuilt = out.join("\n");
    if content.ends_with('\n') {
        rebuilt.push('\n');
    }
    (rebuilt, true)
}

fn flip_checkbox(line: &str) -> String {
    if let Some(pos) = line.find("- [ ]") {
        let mut s = line.to_string();
        s.replace_range(pos..pos + 5, "- [x]");
        s
    } else {
        line.to_string()
    }
}

fn find_matching_line_index(content: &str, phase_name: &str) -> Option<usize> {
    let lines: Vec<&str> = content.lines().collect();

    // Exact match on the checkbox label.
    for (i, line) in lines.iter().enumerate() {
        if let Some(task) = parse_checkbox_line(line.trim()) {
            if task.name == phase_name {
                return Some(i);
            }
        }
    }

    // Case-insensitive match.
    let wanted_lower = phase_name.to_lowercase();
    for (i, line) in lines.iter().enumerate() {
        if let Some(task) = parse_checkbox_line(line.trim()) {
            if task.name.to_lowercase() == wanted_lower {
                return Some(i);
            }
        }
    }

    // Reverse-contains with common prefixes stripped from both sides.
    let stripped_wanted = strip_label_prefix(&wanted_lower);
    for (i, line) in lines.iter().enumerate() {
        if let Some(task) = parse_checkbox_line(line.trim()) {
            let candidate = strip_label_prefix(&task.name.to_lowercase());
            if candidate.contains(&stripped_wanted) || stripped_wanted.contains(&candidate) {
                return Some(i);
            }
        }
    }

    None
}

fn strip_label_prefix(s: &str) -> String {
    for prefix in ["task", "phase", "step"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            let rest = rest.trim_start();
            if let Some(rest) = rest.strip_prefix(|c: char| c.is_ascii_digit()) {
                let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());
                if let Some(rest) = rest.strip_prefix(':') {
                    return rest.trim().to_string();
                }
            }
        }
    }
    s.trim().to_string()
}

/// Standalone entry point matching a phase name against a plan's phases
/// (used by sources that already hold a parsed [`Plan`] rather than raw
/// content).
pub fn match_phase_name<'a>(phases: &'a [Phase], phase_name: &str) -> Option<&'a Phase> {
    phases.iter().find(|p| p.name == phase_name).or_else(|| {
        let wanted_lower = phase_name.to_lowercase();
        phases
            .iter()
            .find(|p| p.name.to_lowercase() == wanted_lower)
    })
}
