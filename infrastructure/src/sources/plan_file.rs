//! A markdown plan file on disk, re-parsed fresh on every `get` since plan
//! files can be hand-edited between iterations.

use async_trait::async_trait;
use conductor_application::ports::work_source::{Mover, SourceError, WorkSource};
use conductor_domain::plan::{mark_phase_complete, parse_plan};
use conductor_domain::work_item::{WorkItem, WorkItemKind, WorkItemStatus};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct PlanFileSource {
    path: PathBuf,
}

impl PlanFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl WorkSource for PlanFileSource {
    async fn get(&self, id: &str) -> Result<WorkItem, SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.path.display())))?;
        let plan = parse_plan(&content);
        Ok(WorkItem {
            id: id.to_string(),
            title: if plan.title.is_empty() {
                id.to_string()
            } else {
                plan.title
            },
            status: WorkItemStatus::Open,
            kind: WorkItemKind::Plan,
            phases: plan.phases,
            raw_content: content,
            validation_commands: plan.validation_commands,
        })
    }

    async fn update_phase(&self, _id: &str, phase_name: &str) -> Result<(), SourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SourceError::ReadFailed(format!("{}: {e}", self.path.display())))?;
        let (updated, found) = mark_phase_complete(&content, phase_name);
        if !found {
            warn!(
                "could not find a checkbox matching phase '{phase_name}' in {}",
                self.path.display()
            );
            return Ok(());
        }
        tokio::fs::write(&self.path, updated)
            .await
            .map_err(|e| SourceError::WriteFailed(format!("{}: {e}", self.path.display())))
    }

    async fn add_note(&self, _id: &str, _note: &str) -> Result<(), SourceError> {
        // Plan files carry no status/notes field beyond their checkboxes.
        Ok(())
    }

    async fn set_status(&self, _id: &str, _status: WorkItemStatus) -> Result<(), SourceError> {
        Ok(())
    }

    fn kind(&self) -> WorkItemKind {
        WorkItemKind::Plan
    }
}

#[async_trait]
impl Mover for PlanFileSource {
    fn file_path(&self, _id: &str) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    async fn move_to(&self, _id: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| SourceError::WriteFailed(e.to_string()))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| SourceError::WriteFailed("plan path has no file name".to_string()))?;
        let dest = dest_dir.join(file_name);
        tokio::fs::rename(&self.path, &dest)
            .await
            .map_err(|e| SourceError::WriteFailed(e.to_string()))?;
        Ok(dest)
    }
}
