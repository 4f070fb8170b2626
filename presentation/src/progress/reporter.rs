//! Spinner-backed `EventSink` used for interactive (non-quiet) runs: a
//! single indicatif spinner tracks the current iteration/review phase,
//! suspended around each printed line so the bar never gets corrupted by
//! interleaved output. Same `MultiProgress` + suspend-to-print discipline
//! the teacher's `ProgressReporter` used for its three-phase council bars,
//! collapsed here to the single long-running bar a bounded agent loop has.

use colored::Colorize;
use conductor_application::ports::event_sink::{EventSink, LoopEvent};
use conductor_domain::review::Severity;
use conductor_domain::safety::ExitReason;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

pub struct ProgressReporter {
    bar: ProgressBar,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    iteration: u32,
    review_iteration: Option<u32>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self {
            bar,
            state: Mutex::new(State::default()),
        }
    }

    fn refresh_message(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let message = match state.review_iteration {
            Some(n) => format!("review iteration {n} (task iteration {})", state.iteration),
            None => format!("iteration {}", state.iteration),
        };
        self.bar.set_message(message);
    }

    fn println(&self, line: impl AsRef<str>) {
        self.bar.suspend(|| println!("{}", line.as_ref()));
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressReporter {
    fn emit(&self, event: LoopEvent) {
        match event {
            LoopEvent::Started { work_item_id } => {
                self.println(format!("{} {}", "starting".cyan().bold(), work_item_id));
            }
            LoopEvent::IterationStarted { iteration } => {
                self.state.lock().unwrap_or_else(|e| e.into_inner()).iteration = iteration;
                self.refresh_message();
            }
            LoopEvent::AgentOutput { .. } => {}
            LoopEvent::ToolUse { tool, .. } => {
                self.println(format!("  {} {}", "tool:".dimmed(), tool));
            }
            LoopEvent::ToolResult { .. } => {}
            LoopEvent::PhaseCompleted { phase_name } => {
                self.println(format!("{} {}", "phase complete:".green().bold(), phase_name));
            }
            LoopEvent::ReviewStarted { review_iteration } => {
                self.state
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .review_iteration = Some(review_iteration);
                self.refresh_message();
            }
            LoopEvent::ReviewResult { result } => {
                if result.passed {
                    self.println(format!("{}", "review passed".green().bold()));
                } else {
                    self.println(format!(
                        "{} {} issue(s) across {} agent(s)",
                        "review found".yellow().bold(),
                        result.total_issues,
                        result.results.len()
                    ));
                    for r in &result.results {
                        if let Some(err) = &r.error {
                            self.println(format!("  {} {}: {}", "!".red(), r.agent_name, err));
                            continue;
                        }
                        for issue in &r.issues {
                            self.println(format!(
                                "  {} {} {}",
                                severity_badge(issue.severity),
                                issue.file.dimmed(),
                                issue.description
                            ));
                        }
                    }
                }
            }
            LoopEvent::Note { message } => {
                self.println(format!("  {} {}", "note:".dimmed(), message));
            }
            LoopEvent::Exited { reason, message } => {
                self.bar.finish_and_clear();
                let label = match reason {
                    ExitReason::Complete => "complete".green().bold(),
                    ExitReason::Blocked => "blocked".red().bold(),
                    ExitReason::Error => "error".red().bold(),
                    ExitReason::MaxIterations | ExitReason::Stagnation => "stopped".yellow().bold(),
                    ExitReason::UserInterrupt => "interrupted".yellow().bold(),
                };
                println!("{}: {}", label, message);
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
