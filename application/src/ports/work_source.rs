//! Work Source port: fetch and mutate the external representation of a
//! [`WorkItem`] (a plan file on disk, or a ticket in an external tracker).

use async_trait::async_trait;
use conductor_domain::work_item::{WorkItem, WorkItemKind, WorkItemStatus};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("work item not found: {0}")]
    NotFound(String),

    #[error("failed to read work item: {0}")]
    ReadFailed(String),

    #[error("failed to write work item: {0}")]
    WriteFailed(String),
}

#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Re-fetch the work item fresh. Sources may be externally mutated
    /// between iterations, so this must never cache.
    async fn get(&self, id: &str) -> Result<WorkItem, SourceError>;

    /// Mark a named phase complete. No-op for sources with no phase concept.
    async fn update_phase(&self, id: &str, phase_name: &str) -> Result<(), SourceError>;

    /// Append a free-text progress note. Failures here must be logged, not
    /// propagated — a broken note channel shouldn't abort a run.
    async fn add_note(&self, id: &str, note: &str) -> Result<(), SourceError>;

    /// Update the work item's overall status.
    async fn set_status(&self, id: &str, status: WorkItemStatus) -> Result<(), SourceError>;

    fn kind(&self) -> WorkItemKind;
}

/// Optional capability for file-backed sources: move the backing file once
/// the work item is complete (e.g. into a "completed plans" directory).
#[async_trait]
pub trait Mover: Send + Sync {
    fn file_path(&self, id: &str) -> Option<PathBuf>;

    async fn move_to(&self, id: &str, dest_dir: &std::path::Path) -> Result<PathBuf, SourceError>;
}
