//! Review Agent port: reviews a set of changed files and returns issues.
//! Implementations must be safe to invoke concurrently with other review
//! agents (the Review Runner fans these out in a `JoinSet`).

use async_trait::async_trait;
use conductor_domain::review::ReviewResult;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ReviewAgentError {
    #[error("failed to spawn review agent: {0}")]
    SpawnFailed(String),

    #[error("review agent exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    #[error("failed to parse review agent output: {0}")]
    ParseFailed(String),

    #[error("review agent cancelled")]
    Cancelled,
}

#[async_trait]
pub trait ReviewAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn review(
        &self,
        working_dir: &Path,
        files_changed: &[String],
        cancel: CancellationToken,
    ) -> Result<ReviewResult, ReviewAgentError>;
}
