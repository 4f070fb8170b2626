//! A configured review agent, wrapped over a subprocess. The agent is run
//! with the changed-file list passed as trailing arguments and is expected
//! to emit a single JSON object on stdout describing what it found — the
//! same "parse the subprocess's structured stdout" discipline the ticket
//! source uses for its own CLI wrapper, adapted here to the review shape.

use async_trait::async_trait;
use conductor_application::ports::review_agent::{ReviewAgent, ReviewAgentError};
use conductor_domain::review::{Issue, ReviewResult, Severity};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct ReviewOutputJson {
    #[serde(default)]
    issues: Vec<IssueJson>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct IssueJson {
    file: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default = "default_severity")]
    severity: String,
    description: String,
}

fn default_severity() -> String {
    "medium".to_string()
}

pub struct SubprocessReviewAgent {
    name: String,
    command: String,
    args: Vec<String>,
    prompt_file: Option<std::path::PathBuf>,
    focus: Vec<String>,
}

impl SubprocessReviewAgent {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            prompt_file: None,
            focus: Vec::new(),
        }
    }

    pub fn with_prompt_file(mut self, prompt_file: Option<std::path::PathBuf>) -> Self {
        self.prompt_file = prompt_file;
        self
    }

    pub fn with_focus(mut self, focus: Vec<String>) -> Self {
        self.focus = focus;
        self
    }
}

#[async_trait]
impl ReviewAgent for SubprocessReviewAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn review(
        &self,
        working_dir: &Path,
        files_changed: &[String],
        cancel: CancellationToken,
    ) -> Result<ReviewResult, ReviewAgentError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(prompt_file) = &self.prompt_file {
            command.arg("--prompt-file").arg(prompt_file);
        }
        for focus in &self.focus {
            command.arg("--focus").arg(focus);
        }
        for file in files_changed {
            command.arg(file);
        }

        let mut child = command
            .spawn()
            .map_err(|e| ReviewAgentError::SpawnFailed(format!("{}: {e}", self.command)))?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(ReviewAgentError::Cancelled);
            }
            output = child.wait_with_output() => {
                output.map_err(|e| ReviewAgentError::SpawnFailed(e.to_string()))?
            }
        };

        if !output.status.success() {
            return Err(ReviewAgentError::NonZeroExit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let parsed: ReviewOutputJson = serde_json::from_slice(&output.stdout)
            .map_err(|e| ReviewAgentError::ParseFailed(format!("{}: {e}", self.name)))?;

        let issues = parsed
            .issues
            .into_iter()
            .map(|i| Issue {
                file: i.file,
                line: i.line,
                severity: Severity::from_str(&i.severity).unwrap_or(Severity::Medium),
                description: i.description,
                agent_name: self.name.clone(),
            })
            .collect();

        Ok(ReviewResult {
            agent_name: self.name.clone(),
            issues,
            summary: parsed.summary,
            error: None,
        })
    }
}
