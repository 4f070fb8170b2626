//! Prompt rendering: turns a [`WorkItem`] (plus, for review-fix turns, the
//! last review's issue markdown) into the text handed to the coding-agent
//! invoker. Follows the teacher's `PromptTemplate`/`AgentPromptTemplate`
//! shape — associated functions returning `String` built with `format!`
//! over raw-string templates — rather than a templating engine, since every
//! template here is static and small.

use crate::work_item::WorkItem;

pub struct PromptTemplate;

impl PromptTemplate {
    /// System preamble shared by every invocation: explains the handshake
    /// the agent must end its turn with.
    pub fn system_preamble() -> &'static str {
        r#"You are an autonomous coding agent driving a work item to completion inside an existing git repository. Make the smallest correct change for the current phase, run any validation commands the plan specifies, and end your final message with a PROGRAMMATOR_STATUS block in this exact form:

PROGRAMMATOR_STATUS:
  phase_completed: "<phase name or null>"
  status: CONTINUE | DONE | BLOCKED
  files_changed:
    - path/to/file
  summary: "one line"
  error: "present iff BLOCKED"
  commit_made: true|false

Report status CONTINUE if you completed a phase but more remain, DONE if the entire work item is finished, or BLOCKED if you cannot proceed without outside help."#
    }

    /// Prompt for a normal task-loop turn.
    pub fn task_prompt(work_item: &WorkItem) -> String {
        let phase_line = match work_item.current_phase() {
            Some(phase) => format!("Current phase: {}", phase.name),
            None => "This work item has no explicit phases; report DONE when the whole task is finished.".to_string(),
        };

        let validation = if work_item.validation_commands.is_empty() {
            String::new()
        } else {
            format!(
                "\n\nValidation commands to run before reporting status:\n{}",
                work_item
                    .validation_commands
                    .iter()
                    .map(|c| format!("- `{}`", c))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        };

        format!(
            "{}\n\n## Work item: {}\n\n{}\n\n{}{}",
            Self::system_preamble(),
            work_item.title,
            phase_line,
            work_item.raw_content,
            validation
        )
    }

    /// Prompt for a review-fix turn: same handshake, but instructed to
    /// address the supplied review findings instead of advancing a phase.
    pub fn review_fix_prompt(work_item: &WorkItem, issues_markdown: &str) -> String {
        format!(
            "{}\n\n## Work item: {}\n\nA review pass found the issues below. Fix them, then report status. Do not move on to a new phase until these are resolved.\n\n{}",
            Self::system_preamble(),
            work_item.title,
            issues_markdown
        )
    }

    /// Prompt used by the review-only runner, which has no work item, only
    /// a branch and a changed-file set to iterate on.
    pub fn review_only_fix_prompt(base_branch: &str, issues_markdown: &str) -> String {
        format!(
            "{}\n\n## Branch under review: {}\n\nAddress the review findings below, then report status.\n\n{}",
            Self::system_preamble(),
            base_branch,
            issues_markdown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_item::{Phase, WorkItemKind, WorkItemStatus};

    fn item() -> WorkItem {
        WorkItem {
            id: "w1".into(),
            title: "Add widgets".into(),
            status: WorkItemStatus::Open,
            kind: WorkItemKind::Plan,
            phases: vec![Phase::new("Write the struct")],
            raw_content: "full plan text".into(),
            validation_commands: vec!["cargo test".into()],
        }
    }

    #[test]
    fn task_prompt_mentions_current_phase_and_validation() {
        let prompt = PromptTemplate::task_prompt(&item());
        assert!(prompt.contains("Write the struct"));
        assert!(prompt.contains("cargo test"));
        assert!(prompt.contains("PROGRAMMATOR_STATUS"));
    }

    #[test]
    fn task_prompt_phaseless_mentions_done() {
        let mut w = item();
        w.phases.clear();
        let prompt = PromptTemplate::task_prompt(&w);
        assert!(prompt.contains("report DONE"));
    }

    #[test]
    fn review_fix_prompt_includes_issues() {
        let prompt = PromptTemplate::review_fix_prompt(&item(), "- issue one");
        assert!(prompt.contains("issue one"));
        assert!(prompt.contains("Do not move on"));
    }
}
