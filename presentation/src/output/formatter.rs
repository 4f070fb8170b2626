//! Final-result formatting: renders a [`LoopResult`] or [`ReviewOnlyResult`]
//! as the one block of summary text printed after a run finishes, so a
//! caller scrolling past the live event stream can still see how it ended.

use colored::Colorize;
use conductor_application::use_cases::review_only_runner::ReviewOnlyResult;
use conductor_application::use_cases::task_loop_runner::LoopResult;
use conductor_domain::safety::ExitReason;

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn format_loop_result(result: &LoopResult) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "\n{}\n",
            "=".repeat(60).dimmed()
        ));
        out.push_str(&format!(
            "{} {}\n",
            "exit reason:".bold(),
            colorize_reason(result.exit_reason)
        ));
        out.push_str(&format!("{} {}\n", "message:".bold(), result.message));
        out.push_str(&format!("{} {}\n", "iterations:".bold(), result.iterations));
        if result.total_files_changed.is_empty() {
            out.push_str(&format!("{} none\n", "files changed:".bold()));
        } else {
            out.push_str(&format!("{}\n", "files changed:".bold()));
            for f in &result.total_files_changed {
                out.push_str(&format!("  - {}\n", f));
            }
        }
        out.push_str(&"=".repeat(60).dimmed().to_string());
        out.push('\n');
        out
    }

    pub fn format_review_only_result(result: &ReviewOnlyResult) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "=".repeat(60).dimmed()));
        out.push_str(&format!(
            "{} {}\n",
            "passed:".bold(),
            if result.passed {
                "yes".green().bold()
            } else {
                "no".red().bold()
            }
        ));
        out.push_str(&format!(
            "{} {}\n",
            "exit reason:".bold(),
            colorize_reason(result.exit_reason)
        ));
        out.push_str(&format!("{} {}\n", "iterations:".bold(), result.iterations));
        out.push_str(&format!("{} {}\n", "commits made:".bold(), result.commits_made));
        if result.files_fixed.is_empty() {
            out.push_str(&format!("{} none\n", "files fixed:".bold()));
        } else {
            out.push_str(&format!("{}\n", "files fixed:".bold()));
            for f in &result.files_fixed {
                out.push_str(&format!("  - {}\n", f));
            }
        }
        out.push_str(&"=".repeat(60).dimmed().to_string());
        out.push('\n');
        out
    }
}

fn colorize_reason(reason: ExitReason) -> colored::ColoredString {
    match reason {
        ExitReason::Complete => "complete".green().bold(),
        ExitReason::Blocked => "blocked".red().bold(),
        ExitReason::Error => "error".red().bold(),
        ExitReason::MaxIterations => "max_iterations".yellow().bold(),
        ExitReason::Stagnation => "stagnation".yellow().bold(),
        ExitReason::UserInterrupt => "user_interrupt".yellow().bold(),
    }
}
