//! Git Helper port. Reads go through libgit2 for speed; writes shell out to
//! the real `git` binary so host-configured hooks and credential helpers
//! still run — see the infrastructure adapter for the rationale.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("not a git repository: {0}")]
    NotARepo(String),

    #[error("git command failed: {0}")]
    CommandFailed(String),

    #[error("libgit2 error: {0}")]
    Libgit2(String),
}

#[async_trait]
pub trait GitHelper: Send + Sync {
    fn current_branch(&self, working_dir: &Path) -> Result<String, GitError>;

    fn changed_files(&self, working_dir: &Path) -> Result<Vec<String>, GitError>;

    async fn checkout_branch(&self, working_dir: &Path, branch: &str) -> Result<(), GitError>;

    async fn commit_files(
        &self,
        working_dir: &Path,
        files: &[String],
        message: &str,
    ) -> Result<(), GitError>;

    async fn move_and_commit(
        &self,
        working_dir: &Path,
        from: &Path,
        to: &Path,
        message: &str,
    ) -> Result<PathBuf, GitError>;
}
