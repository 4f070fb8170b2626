//! Console `EventSink`: renders [`LoopEvent`]s as colored, single-line
//! progress output while a run is in flight. Mirrors the teacher's
//! `ConsoleFormatter` — a struct of small `format_*`/`print_*` helpers built
//! with `colored`, no templating engine.

use colored::Colorize;
use conductor_application::ports::event_sink::{EventSink, LoopEvent};
use conductor_domain::review::Severity;
use conductor_domain::safety::ExitReason;
use std::sync::Mutex;

/// Prints each [`LoopEvent`] to stdout as it's emitted. `quiet` suppresses
/// everything but phase completions, review results, and the terminal exit
/// line — the signal a CI log actually needs.
pub struct ConsoleEventSink {
    quiet: bool,
    // Guards interleaved writes if the sink is ever shared across tasks
    // (the review runner fans out concurrently and could in principle emit
    // from multiple agents at once in a future revision).
    lock: Mutex<()>,
}

impl ConsoleEventSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            lock: Mutex::new(()),
        }
    }
}

impl EventSink for ConsoleEventSink {
    fn emit(&self, event: LoopEvent) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match event {
            LoopEvent::Started { work_item_id } => {
                if !self.quiet {
                    println!("{} {}", "starting".cyan().bold(), work_item_id);
                }
            }
            LoopEvent::IterationStarted { iteration } => {
                if !self.quiet {
                    println!("{} iteration {}", "->".blue(), iteration);
                }
            }
            LoopEvent::AgentOutput { .. } => {
                // Raw agent stdout is voluminous; surfaced only at -vv+ via
                // tracing, not duplicated here.
            }
            LoopEvent::ToolUse { tool, .. } => {
                if !self.quiet {
                    println!("  {} {}", "tool:".dimmed(), tool);
                }
            }
            LoopEvent::ToolResult { .. } => {}
            LoopEvent::PhaseCompleted { phase_name } => {
                println!("{} {}", "phase complete:".green().bold(), phase_name);
            }
            LoopEvent::ReviewStarted { review_iteration } => {
                println!(
                    "{} review iteration {}",
                    "->".magenta(),
                    review_iteration
                );
            }
            LoopEvent::ReviewResult { result } => {
                if result.passed {
                    println!("{}", "review passed".green().bold());
                } else {
                    println!(
                        "{} {} issue(s) across {} agent(s)",
                        "review found".yellow().bold(),
                        result.total_issues,
                        result.results.len()
                    );
                    for r in &result.results {
                        if let Some(err) = &r.error {
                            println!("  {} {}: {}", "!".red(), r.agent_name, err);
                            continue;
                        }
                        for issue in &r.issues {
                            println!(
                                "  {} {} {}",
                                severity_badge(issue.severity),
                                issue.file.dimmed(),
                                issue.description
                            );
                        }
                    }
                }
            }
            LoopEvent::Note { message } => {
                if !self.quiet {
                    println!("  {} {}", "note:".dimmed(), message);
                }
            }
            LoopEvent::Exited { reason, message } => {
                let (label, colorize): (&str, fn(&str) -> colored::ColoredString) = match reason {
                    ExitReason::Complete => ("complete", |s: &str| s.green().bold()),
                    ExitReason::Blocked => ("blocked", |s: &str| s.red().bold()),
                    ExitReason::Error => ("error", |s: &str| s.red().bold()),
                    ExitReason::MaxIterations | ExitReason::Stagnation => {
                        ("stopped", |s: &str| s.yellow().bold())
                    }
                    ExitReason::UserInterrupt => ("interrupted", |s: &str| s.yellow().bold()),
                };
                println!("{}: {}", colorize(label), message);
            }
        }
    }
}

fn severity_badge(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::Critical => "[critical]".red().bold(),
        Severity::High => "[high]".red(),
        Severity::Medium => "[medium]".yellow(),
        Severity::Low => "[low]".normal(),
    }
}
