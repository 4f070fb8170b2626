//! Agent Invoker port: runs the external coding-agent subprocess with a
//! rendered prompt and surfaces streaming events while it works.
//!
//! Mirrors the shape of the teacher's `LlmGateway`/`LlmSession` ports — an
//! async trait returning a typed error enum — generalized to a
//! subprocess-with-streaming-callbacks contract instead of a request/response
//! session.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum InvokerError {
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(String),

    #[error("agent process exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    #[error("agent invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("agent invocation cancelled")]
    Cancelled,

    #[error("I/O error communicating with agent process: {0}")]
    Io(String),
}

/// Snapshot of process resource usage, polled on a background tick while
/// the subprocess runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStats {
    pub rss_bytes: u64,
    pub cpu_percent: f32,
}

/// Callbacks the invoker calls synchronously, in emission order, from its
/// stream-reading task. Implementors must not block here.
pub struct InvokeOptions<'a> {
    pub working_dir: PathBuf,
    pub streaming: bool,
    pub timeout: Duration,
    pub extra_flags: Vec<String>,
    pub cancel: CancellationToken,
    pub on_output: Option<Box<dyn Fn(&str) + Send + Sync + 'a>>,
    pub on_tool_use: Option<Box<dyn Fn(&str, &serde_json::Value) + Send + Sync + 'a>>,
    pub on_tool_result: Option<Box<dyn Fn(&str, &str) + Send + Sync + 'a>>,
    pub on_process_stats: Option<Box<dyn Fn(ProcessStats) + Send + Sync + 'a>>,
    /// Fired once, as soon as the executor announces which model it is
    /// running as for this turn.
    pub on_system_init: Option<Box<dyn Fn(&str) + Send + Sync + 'a>>,
    /// Fired on every running token-count update seen in the stream.
    pub on_tokens: Option<Box<dyn Fn(u64) + Send + Sync + 'a>>,
    /// Fired once with the turn's settled token count, after the stream
    /// closes but before the process exit status is known.
    pub on_final_tokens: Option<Box<dyn Fn(u64) + Send + Sync + 'a>>,
    /// Fired once the subprocess has been spawned, with its pid.
    pub on_process_start: Option<Box<dyn Fn(u32) + Send + Sync + 'a>>,
    /// Fired once the subprocess has exited, with its exit code (or `-1`
    /// if it was killed rather than exiting on its own).
    pub on_process_end: Option<Box<dyn Fn(i32) + Send + Sync + 'a>>,
}

impl<'a> InvokeOptions<'a> {
    pub fn new(working_dir: PathBuf, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            working_dir,
            streaming: true,
            timeout,
            extra_flags: Vec::new(),
            cancel,
            on_output: None,
            on_tool_use: None,
            on_tool_result: None,
            on_process_stats: None,
            on_system_init: None,
            on_tokens: None,
            on_final_tokens: None,
            on_process_start: None,
            on_process_end: None,
        }
    }
}

/// Collects the system-init/token telemetry an invocation reports via
/// callbacks into plain values the caller can read back afterward.
///
/// `InvokeOptions`' callbacks are `Fn`, not `FnMut` (the invoker calls them
/// from inside a borrowed `&options`), so capturing mutable state in them
/// needs a `Sync`-safe cell rather than a plain `RefCell`.
#[derive(Default)]
pub struct InvocationTelemetry {
    model: std::sync::Mutex<Option<String>>,
    tokens: std::sync::Mutex<u64>,
}

impl InvocationTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this collector's callbacks to `options`. `self` must outlive
    /// `options`, which holds true for the usual call pattern of
    /// constructing both as locals around a single `invoke(...).await`.
    pub fn wire<'a>(&'a self, options: &mut InvokeOptions<'a>) {
        options.on_system_init = Some(Box::new(move |model: &str| {
            *self.model.lock().unwrap() = Some(model.to_string());
        }));
        options.on_final_tokens = Some(Box::new(move |tokens: u64| {
            *self.tokens.lock().unwrap() = tokens;
        }));
    }

    /// Consume the collector, returning the model name it saw (if any) and
    /// the last final-token count reported.
    pub fn into_parts(self) -> (Option<String>, u64) {
        (
            self.model.into_inner().unwrap(),
            self.tokens.into_inner().unwrap(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOutput {
    pub text: String,
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        prompt: &str,
        options: InvokeOptions<'_>,
    ) -> Result<InvokeOutput, InvokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_collects_what_its_callbacks_report() {
        let telemetry = InvocationTelemetry::new();
        let mut options = InvokeOptions::new(
            PathBuf::from("."),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        telemetry.wire(&mut options);

        (options.on_system_init.as_ref().unwrap())("claude-sonnet");
        (options.on_final_tokens.as_ref().unwrap())(512);
        drop(options);

        let (model, tokens) = telemetry.into_parts();
        assert_eq!(model.as_deref(), Some("claude-sonnet"));
        assert_eq!(tokens, 512);
    }

    #[test]
    fn telemetry_defaults_to_no_model_and_zero_tokens() {
        let telemetry = InvocationTelemetry::new();
        let mut options = InvokeOptions::new(
            PathBuf::from("."),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        telemetry.wire(&mut options);
        drop(options);

        let (model, tokens) = telemetry.into_parts();
        assert!(model.is_none());
        assert_eq!(tokens, 0);
    }
}
