//! A ticket tracked by an external CLI, wrapped over subprocess calls. The
//! CLI is expected to expose `get`/`update-phase`/`add-note`/`set-status`
//! subcommands and to emit JSON for `get`.

use async_trait::async_trait;
use conductor_application::ports::work_source::{SourceError, WorkSource};
use conductor_domain::work_item::{Phase, WorkItem, WorkItemKind, WorkItemStatus};
use serde::Deserialize;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct TicketJson {
    title: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    phases: Vec<TicketPhaseJson>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    validation_commands: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TicketPhaseJson {
    name: String,
    #[serde(default)]
    completed: bool,
}

pub struct TicketCliSource {
    command: String,
}

impl TicketCliSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output, SourceError> {
        Command::new(&self.command)
            .args(args)
            .output()
            .await
            .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.command)))
    }
}

#[async_trait]
impl WorkSource for TicketCliSource {
    async fn get(&self, id: &str) -> Result<WorkItem, SourceError> {
        let output = self.run(&["get", id]).await?;
        if !output.status.success() {
            return Err(SourceError::NotFound(format!(
                "{} get {id} failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        let parsed: TicketJson = serde_json::from_slice(&output.stdout)
            .map_err(|e| SourceError::ReadFailed(format!("invalid ticket JSON: {e}")))?;

        let status = match parsed.status.as_str() {
            "in_progress" => WorkItemStatus::InProgress,
            "closed" => WorkItemStatus::Closed,
            _ => WorkItemStatus::Open,
        };

        Ok(WorkItem {
            id: id.to_string(),
            title: parsed.title,
            status,
            kind: WorkItemKind::Ticket,
            phases: parsed
                .phases
                .into_iter()
                .map(|p| Phase {
                    name: p.name,
                    completed: p.completed,
                })
                .collect(),
            raw_content: parsed.body,
            validation_commands: parsed.validation_commands,
        })
    }

    async fn update_phase(&self, id: &str, phase_name: &str) -> Result<(), SourceError> {
        let output = self.run(&["update-phase", id, phase_name]).await?;
        if !output.status.success() {
            warn!(
                "{} update-phase {id} '{phase_name}' failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }

    async fn add_note(&self, id: &str, note: &str) -> Result<(), SourceError> {
        match self.run(&["add-note", id, note]).await {
            Ok(output) if !output.status.success() => {
                warn!(
                    "{} add-note {id} failed: {}",
                    self.command,
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            Err(e) => warn!("{} add-note {id} failed: {e}", self.command),
            _ => {}
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: WorkItemStatus) -> Result<(), SourceError> {
        let status_str = match status {
            WorkItemStatus::Open => "open",
            WorkItemStatus::InProgress => "in_progress",
            WorkItemStatus::Closed => "closed",
        };
        let output = self.run(&["set-status", id, status_str]).await?;
        if !output.status.success() {
            warn!(
                "{} set-status {id} {status_str} failed: {}",
                self.command,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }

    fn kind(&self) -> WorkItemKind {
        WorkItemKind::Ticket
    }
}
