//! Event Bus port: a tagged union of structured events the runners emit as
//! they work, consumed by a presentation-layer sink (progress bar, console
//! log, JSONL logger — any number of these may be attached).

use conductor_domain::review::RunResult;
use conductor_domain::safety::ExitReason;

#[derive(Debug, Clone)]
pub enum LoopEvent {
    Started { work_item_id: String },
    IterationStarted { iteration: u32 },
    AgentOutput { text: String },
    ToolUse { tool: String, args: serde_json::Value },
    ToolResult { tool: String, result: String },
    PhaseCompleted { phase_name: String },
    ReviewStarted { review_iteration: u32 },
    ReviewResult { result: RunResult },
    Note { message: String },
    Exited { reason: ExitReason, message: String },
}

/// Sink for [`LoopEvent`]s. Implementations (console formatter, progress
/// bar, JSONL logger) must not block meaningfully — this is called
/// synchronously from the loop's hot path.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LoopEvent);
}

/// No-op sink, used in tests.
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: LoopEvent) {}
}
