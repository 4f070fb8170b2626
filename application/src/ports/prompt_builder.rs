//! Prompt Builder port. The domain crate's `PromptTemplate` is a perfectly
//! good default implementation, but keeping this as a port lets an
//! infrastructure adapter swap in project-specific prompt customization
//! (e.g. loading a `.conductor/prompts/*.md` override) without the use
//! cases knowing the difference.

use conductor_domain::work_item::WorkItem;

pub trait PromptBuilder: Send + Sync {
    fn task_prompt(&self, work_item: &WorkItem) -> String;

    fn review_fix_prompt(&self, work_item: &WorkItem, issues_markdown: &str) -> String;

    fn review_only_fix_prompt(&self, base_branch: &str, issues_markdown: &str) -> String;
}

/// Default builder: delegates straight to `conductor_domain::prompt::PromptTemplate`.
pub struct DefaultPromptBuilder;

impl PromptBuilder for DefaultPromptBuilder {
    fn task_prompt(&self, work_item: &WorkItem) -> String {
        conductor_domain::prompt::PromptTemplate::task_prompt(work_item)
    }

    fn review_fix_prompt(&self, work_item: &WorkItem, issues_markdown: &str) -> String {
        conductor_domain::prompt::PromptTemplate::review_fix_prompt(work_item, issues_markdown)
    }

    fn review_only_fix_prompt(&self, base_branch: &str, issues_markdown: &str) -> String {
        conductor_domain::prompt::PromptTemplate::review_only_fix_prompt(
            base_branch,
            issues_markdown,
        )
    }
}
