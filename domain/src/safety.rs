//! Safety limits: pure comparisons of a rolling [`SafetyState`] against a
//! configured [`SafetyConfig`], deciding whether the outer loop must stop.
//!
//! Mirrors the teacher's [`crate::prompt`]-adjacent `AgentPolicy` shape: a
//! small config struct plus stateless decision functions that compare a
//! counter to a threshold and return a tagged result. No I/O, no mutation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configured thresholds for the task loop and the review-fix loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub max_iterations: u32,
    pub stagnation_limit: u32,
    pub max_review_iterations: u32,
    pub timeout_seconds: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            stagnation_limit: 3,
            max_review_iterations: 5,
            timeout_seconds: 600,
        }
    }
}

/// Why the loop terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Complete,
    MaxIterations,
    Stagnation,
    Blocked,
    Error,
    UserInterrupt,
}

/// Rolling counters the task loop runner maintains across iterations.
#[derive(Debug, Clone, Default)]
pub struct SafetyState {
    pub iteration: u32,
    pub consecutive_no_changes: u32,
    pub review_iterations: u32,
    pub in_review_phase: bool,
    /// Last-seen executor model name, reported by the invoker's
    /// `on_system_init` event.
    pub model: Option<String>,
    /// Token count reported for the most recently completed invocation.
    pub tokens_this_iteration: u64,
    /// Running total across every invocation made so far this run.
    pub total_tokens: u64,
    pub recent_summaries: VecDeque<String>,
}

const RECENT_SUMMARY_CAPACITY: usize = 5;

impl SafetyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one iteration's outcome: resets the stagnation counter iff
    /// `files_changed` was non-empty, and keeps the last few summaries for
    /// stagnation diagnostics. Does not touch `iteration` itself — the
    /// caller bumps that once per pass, before invoking the agent.
    pub fn record_iteration(&mut self, files_changed: bool, summary: &str) {
        if files_changed {
            self.consecutive_no_changes = 0;
        } else {
            self.consecutive_no_changes += 1;
        }
        if self.recent_summaries.len() == RECENT_SUMMARY_CAPACITY {
            self.recent_summaries.pop_front();
        }
        self.recent_summaries.push_back(summary.to_string());
    }

    /// Record the executor model name an invocation's `on_system_init`
    /// callback reported.
    pub fn record_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Record an invocation's settled token count: updates the per-iteration
    /// figure and adds it to the running total.
    pub fn record_tokens(&mut self, tokens: u64) {
        self.tokens_this_iteration = tokens;
        self.total_tokens += tokens;
    }
}

/// The Safety Monitor's verdict for the current iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub should_exit: bool,
    pub reason: Option<ExitReason>,
    pub message: Option<String>,
}

impl SafetyVerdict {
    fn ok() -> Self {
        Self {
            should_exit: false,
            reason: None,
            message: None,
        }
    }

    fn exit(reason: ExitReason, message: impl Into<String>) -> Self {
        Self {
            should_exit: true,
            reason: Some(reason),
            message: Some(message.into()),
        }
    }
}

/// Stateless evaluator: given a config and the current state snapshot,
/// decide whether the loop must stop, and why.
pub struct SafetyMonitor;

impl SafetyMonitor {
    pub fn check(config: &SafetyConfig, state: &SafetyState) -> SafetyVerdict {
        if state.iteration > config.max_iterations {
            return SafetyVerdict::exit(
                ExitReason::MaxIterations,
                format!(
                    "reached the configured limit of {} iterations",
                    config.max_iterations
                ),
            );
        }

        if state.consecutive_no_changes >= config.stagnation_limit {
            let recent: Vec<String> = state.recent_summaries.iter().cloned().collect();
            return SafetyVerdict::exit(
                ExitReason::Stagnation,
                format!(
                    "{} consecutive iterations made no file changes; recent summaries: {}",
                    state.consecutive_no_changes,
                    recent.join(" | ")
                ),
            );
        }

        SafetyVerdict::ok()
    }
}
