//! Application-level configuration: the typed, validated counterpart of the
//! infrastructure layer's `FileConfig`. Mirrors the teacher's
//! `ExecutionParams`/`QuorumConfig` split — a handful of small, serializable
//! structs with builder methods, assembled into one `RunConfig` the use
//! cases are constructed with.

use conductor_domain::review::SeverityFilter;
use conductor_domain::safety::SafetyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One configured review agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAgentSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub prompt_file: Option<PathBuf>,
    pub focus: Vec<String>,
    #[serde(default)]
    pub severity_filter: SeverityFilter,
}

/// Configuration for the review pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub agents: Vec<ReviewAgentSpec>,
    pub parallel: bool,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            agents: Vec::new(),
            parallel: true,
        }
    }
}

impl ReviewConfig {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Configuration for the coding-agent invoker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub streaming: bool,
    pub extra_flags: Vec<String>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            command: "agent".to_string(),
            args: Vec::new(),
            streaming: true,
            extra_flags: Vec::new(),
        }
    }
}

/// Git integration toggles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GitConfig {
    pub auto_branch: bool,
    pub auto_commit: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            auto_branch: true,
            auto_commit: true,
        }
    }
}

/// Top-level configuration a `TaskLoopRunner` / `ReviewOnlyRunner` is built
/// from. Produced by the infrastructure layer's config loader from a merged
/// `FileConfig` + CLI overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub safety: SafetyConfig,
    pub review: ReviewConfig,
    pub invoker: InvokerConfig,
    pub git: GitConfig,
    pub working_dir: PathBuf,
    pub completed_plans_dir: Option<PathBuf>,
}

impl RunConfig {
    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = dir;
        self
    }
}
