//! The pure decision state machine.
//!
//! Mirrors the teacher's `AgentPolicy`: a small struct holding configuration
//! plus counters, with total, deterministic, I/O-free methods that return a
//! tagged decision. The engine never touches a work-source, a subprocess, or
//! the filesystem — only the runner does, by interpreting the `Action` it's
//! handed back.

use crate::safety::{ExitReason, SafetyConfig};
use crate::status::ParsedStatus;

/// What the runner should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InvokeAgent { is_review_fix: bool },
    RunReview,
    Complete,
    Exit {
        reason: ExitReason,
        message: String,
        iterations: u32,
    },
}

/// The engine's interpretation of one parsed status block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusProcessResult {
    pub phase_completed: Option<String>,
    pub files_changed: Vec<String>,
    pub summary: String,
    pub task_completed: bool,
    pub blocked: bool,
    pub should_exit: bool,
    pub exit_reason: Option<ExitReason>,
    pub reset_pending_review_fix: bool,
}

/// Outcome of asking the engine to interpret one review run's verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewDecision {
    pub passed: bool,
    pub needs_fix: bool,
}

/// The pure core: holds only configuration and the counters the task loop
/// needs across iterations to decide review transitions.
#[derive(Debug, Clone)]
pub struct Engine {
    pub safety: SafetyConfig,
    pub review_iterations: u32,
    pub pending_review_fix: bool,
    pub review_passed: bool,
    pub review_only_mode: bool,
}

impl Engine {
    pub fn new(safety: SafetyConfig, review_only_mode: bool) -> Self {
        Self {
            safety,
            review_iterations: 0,
            pending_review_fix: false,
            review_passed: false,
            review_only_mode,
        }
    }

    /// Interpret a parsed status (or its absence) into the facts the runner
    /// needs to apply side effects.
    pub fn process_status(&self, status: Option<&ParsedStatus>) -> StatusProcessResult {
        let Some(status) = status else {
            return StatusProcessResult::default();
        };

        let mut result = StatusProcessResult {
            phase_completed: status.phase_completed.clone(),
            files_changed: status.files_changed.clone(),
            summary: status.summary.clone(),
            reset_pending_review_fix: self.pending_review_fix,
            ..Default::default()
        };

        match status.status {
            Some(crate::status::TaskStatus::Done) => {
                result.task_completed = true;
            }
            Some(crate::status::TaskStatus::Blocked) => {
                result.blocked = true;
                result.should_exit = true;
                result.exit_reason = Some(ExitReason::Blocked);
            }
            _ => {}
        }

        result
    }

    /// Interpret the outcome of one review iteration. Does not touch
    /// iteration counters — those belong to `SafetyState`.
    pub fn decide_review(&mut self, passed: bool) -> ReviewDecision {
        if passed {
            self.review_passed = true;
            self.pending_review_fix = false;
            ReviewDecision {
                passed: true,
                needs_fix: false,
            }
        } else {
            self.pending_review_fix = true;
            self.review_passed = false;
            ReviewDecision {
                passed: false,
                needs_fix: true,
            }
        }
    }

    /// Clear all review-cycle state, e.g. when a fresh work item begins.
    pub fn reset_review_state(&mut self) {
        self.review_iterations = 0;
        self.pending_review_fix = false;
        self.review_passed = false;
    }
}
