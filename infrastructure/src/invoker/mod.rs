//! Subprocess-backed coding-agent invoker: spawns the configured binary,
//! streams its stdout line by line, classifies lines into output/tool-use
//! events via the callbacks on [`InvokeOptions`], enforces a hard timeout,
//! and kills the process on cancellation. A background task polls process
//! resource stats and is always joined before returning, so a `?`-early
//! return can never leak it — the same scoped-acquisition discipline the
//! teacher's transport layer uses for its own background reader task.

mod stats;

use async_trait::async_trait;
use conductor_application::ports::agent_invoker::{
    AgentInvoker, InvokeOptions, InvokeOutput, InvokerError, ProcessStats,
};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::warn;

pub struct SubprocessAgentInvoker {
    command: String,
    args: Vec<String>,
}

impl SubprocessAgentInvoker {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl AgentInvoker for SubprocessAgentInvoker {
    async fn invoke(
        &self,
        prompt: &str,
        options: InvokeOptions<'_>,
    ) -> Result<InvokeOutput, InvokerError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .args(&options.extra_flags)
            .current_dir(&options.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group so a timeout/cancel kill reaches every
            // grandchild the agent spawns, not just the direct child.
            command.process_group(0);
        }

        let mut child: Child = command
            .spawn()
            .map_err(|e| InvokerError::SpawnFailed(e.to_string()))?;

        if let Some(pid) = child.id() {
            if let Some(on_process_start) = &options.on_process_start {
                on_process_start(pid);
            }
        }

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(prompt.as_bytes()).await;
            let _ = stdin.shutdown().await;
        }

        let (stats_handle, mut stats_rx) = match child.id() {
            Some(pid) => {
                let (handle, rx) = stats::spawn_poller(pid);
                (Some(handle), Some(rx))
            }
            None => (None, None),
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InvokerError::Io("agent process had no stdout".to_string()))?;
        let mut reader = BufReader::new(stdout).lines();

        let mut collected = String::new();
        let mut last_tokens = 0u64;
        let read_loop = async {
            let mut lines_done = false;
            loop {
                if lines_done {
                    break;
                }
                tokio::select! {
                    line = reader.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                if let Some(on_output) = &options.on_output {
                                    on_output(&line);
                                }
                                if let Some((tool, args)) = classify_tool_use(&line) {
                                    if let Some(on_tool_use) = &options.on_tool_use {
                                        on_tool_use(&tool, &args);
                                    }
                                }
                                if let Some(model) = classify_system_init(&line) {
                                    if let Some(on_system_init) = &options.on_system_init {
                                        on_system_init(&model);
                                    }
                                }
                                if let Some(tokens) = classify_tokens(&line) {
                                    last_tokens = tokens;
                                    if let Some(on_tokens) = &options.on_tokens {
                                        on_tokens(tokens);
                                    }
                                }
                                collected.push_str(&line);
                                collected.push('\n');
                            }
                            _ => lines_done = true,
                        }
                    }
                    stats = recv_stats(&mut stats_rx), if stats_rx.is_some() => {
                        if let Some(stats) = stats {
                            if let Some(on_stats) = &options.on_process_stats {
                                on_stats(stats);
                            }
                        }
                    }
                }
            }
            (collected, last_tokens)
        };

        let outcome = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => {
                kill_process_group(&mut child);
                join_stats(stats_handle).await;
                if let Some(on_process_end) = &options.on_process_end {
                    on_process_end(-1);
                }
                return Err(InvokerError::Cancelled);
            }
            result = tokio::time::timeout(options.timeout, read_loop) => result,
        };

        let (text, final_tokens) = match outcome {
            Ok(result) => result,
            Err(_) => {
                kill_process_group(&mut child);
                join_stats(stats_handle).await;
                if let Some(on_process_end) = &options.on_process_end {
                    on_process_end(-1);
                }
                return Err(InvokerError::Timeout(options.timeout));
            }
        };

        if let Some(on_final_tokens) = &options.on_final_tokens {
            on_final_tokens(final_tokens);
        }

        let status = child
            .wait()
            .await
            .map_err(|e| InvokerError::Io(e.to_string()))?;
        join_stats(stats_handle).await;
        if let Some(on_process_end) = &options.on_process_end {
            on_process_end(status.code().unwrap_or(-1));
        }

        if !status.success() {
            let stderr = if let Some(mut stderr) = child.stderr.take() {
                let mut buf = String::new();
                use tokio::io::AsyncReadExt;
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            } else {
                String::new()
            };
            return Err(InvokerError::NonZeroExit {
                status: status.code().unwrap_or(-1),
                stderr,
            });
        }

        Ok(InvokeOutput { text })
    }
}

/// Kills the agent's whole process group (it was spawned as its own group
/// leader via `process_group(0)`), not just the direct child, so tool
/// subprocesses the agent itself spawned don't linger. Shells out to the
/// `kill` binary rather than linking libc, matching the corpus convention
/// of reaching for the real CLI tool over raw FFI for process/git
/// operations.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = std::process::Command::new("kill")
            .arg("-KILL")
            .arg(format!("-{pid}"))
            .status();
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.start_kill();
}

async fn join_stats(handle: Option<tokio::task::JoinHandle<()>>) {
    if let Some(handle) = handle {
        if let Err(e) = handle.await {
            warn!("process stats poller task failed to join: {e}");
        }
    }
}

/// Polls the stats channel without taking ownership of it, so it can live
/// inside a `tokio::select!` arm guarded by `stats_rx.is_some()`.
async fn recv_stats(rx: &mut Option<tokio::sync::mpsc::UnboundedReceiver<ProcessStats>>) -> Option<ProcessStats> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Lines of the form `TOOL_USE: <name> <json-args>` are surfaced as
/// tool-use events; everything else is plain output.
fn classify_tool_use(line: &str) -> Option<(String, serde_json::Value)> {
    let rest = line.strip_prefix("TOOL_USE:")?;
    let rest = rest.trim();
    let (name, json_part) = rest.split_once(' ')?;
    let args = serde_json::from_str(json_part.trim()).unwrap_or(serde_json::Value::Null);
    Some((name.to_string(), args))
}

/// A `SYSTEM_INIT: <model>` line announces the executor model once per
/// invocation, analogous to the teacher's session-start handshake.
fn classify_system_init(line: &str) -> Option<String> {
    let model = line.strip_prefix("SYSTEM_INIT:")?.trim();
    if model.is_empty() {
        None
    } else {
        Some(model.to_string())
    }
}

/// A `TOKENS: <n>` line reports the running token count for the turn.
fn classify_tokens(line: &str) -> Option<u64> {
    line.strip_prefix("TOKENS:")?.trim().parse().ok()
}
