//! JSONL file writer for [`LoopEvent`]s.
//!
//! Each event is serialized as a single JSON line with a `type` field and a
//! `timestamp`, appended to the file via a buffered writer. Adapted
//! directly from the teacher's conversation logger, which used the same
//! mutex-guarded buffered writer and flush-on-drop discipline for a
//! different event type.

use conductor_application::ports::event_sink::{EventSink, LoopEvent};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub struct JsonlProgressLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlProgressLog {
    /// Create a new log writing to the given path. Creates parent
    /// directories as needed. Returns `None` (logging a warning) rather
    /// than propagating an error — a broken log sink shouldn't abort a run.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("could not create progress log directory {}: {e}", parent.display());
                return None;
            }
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("could not create progress log file {}: {e}", path.display());
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, event_type: &str, payload: serde_json::Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let record = serde_json::json!({
            "type": event_type,
            "timestamp": timestamp,
            "data": payload,
        });
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

impl EventSink for JsonlProgressLog {
    fn emit(&self, event: LoopEvent) {
        match event {
            LoopEvent::Started { work_item_id } => {
                self.write_record("started", serde_json::json!({ "work_item_id": work_item_id }))
            }
            LoopEvent::IterationStarted { iteration } => {
                self.write_record("iteration_started", serde_json::json!({ "iteration": iteration }))
            }
            LoopEvent::AgentOutput { text } => {
                self.write_record("agent_output", serde_json::json!({ "bytes": text.len() }))
            }
            LoopEvent::ToolUse { tool, args } => {
                self.write_record("tool_use", serde_json::json!({ "tool": tool, "args": args }))
            }
            LoopEvent::ToolResult { tool, result } => self.write_record(
                "tool_result",
                serde_json::json!({ "tool": tool, "result": result }),
            ),
            LoopEvent::PhaseCompleted { phase_name } => self.write_record(
                "phase_completed",
                serde_json::json!({ "phase_name": phase_name }),
            ),
            LoopEvent::ReviewStarted { review_iteration } => self.write_record(
                "review_started",
                serde_json::json!({ "review_iteration": review_iteration }),
            ),
            LoopEvent::ReviewResult { result } => {
                self.write_record("review_result", serde_json::to_value(&result).unwrap_or_default())
            }
            LoopEvent::Note { message } => {
                self.write_record("note", serde_json::json!({ "message": message }))
            }
            LoopEvent::Exited { reason, message } => self.write_record(
                "exited",
                serde_json::json!({ "reason": format!("{:?}", reason), "message": message }),
            ),
        }
    }
}

impl Drop for JsonlProgressLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
