//! Git Helper adapter: reads go through `git2` (stateless, re-opens the
//! repository fresh each call, same as the reference implementation this
//! was grounded on); writes shell out to the real `git` binary so that
//! commit hooks, signing, and credential helpers configured for the host
//! `git` still apply.

use async_trait::async_trait;
use conductor_application::ports::git_helper::{GitError, GitHelper};
use git2::{Repository, StatusOptions};
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub struct Git2GitHelper;

impl Git2GitHelper {
    pub fn new() -> Self {
        Self
    }

    fn open(working_dir: &Path) -> Result<Repository, GitError> {
        Repository::discover(working_dir)
            .map_err(|e| GitError::NotARepo(format!("{}: {e}", working_dir.display())))
    }
}

impl Default for Git2GitHelper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitHelper for Git2GitHelper {
    fn current_branch(&self, working_dir: &Path) -> Result<String, GitError> {
        let repo = Self::open(working_dir)?;
        let head = repo.head().map_err(|e| GitError::Libgit2(e.to_string()))?;
        match head.shorthand() {
            Some(name) => Ok(name.to_string()),
            None => {
                let oid = head
                    .target()
                    .ok_or_else(|| GitError::Libgit2("HEAD has no target".to_string()))?;
                Ok(oid.to_string()[..7].to_string())
            }
        }
    }

    fn changed_files(&self, working_dir: &Path) -> Result<Vec<String>, GitError> {
        let repo = Self::open(working_dir)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let statuses = repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Libgit2(e.to_string()))?;
        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(|p| p.to_string()))
            .collect())
    }

    async fn checkout_branch(&self, working_dir: &Path, branch: &str) -> Result<(), GitError> {
        let status = Command::new("git")
            .arg("-C")
            .arg(working_dir)
            .args(["checkout", "-B", branch])
            .status()
            .await
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;
        if !status.success() {
            return Err(GitError::CommandFailed(format!(
                "git checkout -B {branch} exited with {status}"
            )));
        }
        Ok(())
    }

    async fn commit_files(
        &self,
        working_dir: &Path,
        files: &[String],
        message: &str,
    ) -> Result<(), GitError> {
        if files.is_empty() {
            return Ok(());
        }
        let add_status = Command::new("git")
            .arg("-C")
            .arg(working_dir)
            .arg("add")
            .args(files)
            .status()
            .await
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;
        if !add_status.success() {
            return Err(GitError::CommandFailed(format!(
                "git add exited with {add_status}"
            )));
        }

        let commit_status = Command::new("git")
            .arg("-C")
            .arg(working_dir)
            .args(["commit", "-m", message])
            .status()
            .await
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;
        if !commit_status.success() {
            return Err(GitError::CommandFailed(format!(
                "git commit exited with {commit_status}"
            )));
        }
        Ok(())
    }

    async fn move_and_commit(
        &self,
        working_dir: &Path,
        from: &Path,
        to: &Path,
        message: &str,
    ) -> Result<PathBuf, GitError> {
        let mv_status = Command::new("git")
            .arg("-C")
            .arg(working_dir)
            .arg("mv")
            .arg(from)
            .arg(to)
            .status()
            .await
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;
        if !mv_status.success() {
            return Err(GitError::CommandFailed(format!(
                "git mv exited with {mv_status}"
            )));
        }

        let commit_status = Command::new("git")
            .arg("-C")
            .arg(working_dir)
            .args(["commit", "-m", message])
            .status()
            .await
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;
        if !commit_status.success() {
            return Err(GitError::CommandFailed(format!(
                "git commit exited with {commit_status}"
            )));
        }

        Ok(to.to_path_buf())
    }
}
