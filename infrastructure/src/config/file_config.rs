//! The on-disk configuration schema, deserialized by [`super::loader::ConfigLoader`]
//! and validated before being converted into a [`conductor_application::RunConfig`].
//!
//! Mirrors the teacher's `FileConfig`: one struct per concern, every field
//! `#[serde(default)]` so a project can override just the pieces it cares
//! about, plus a `validate()` that collects issues rather than failing fast
//! on the first one.

use conductor_application::config::{GitConfig, InvokerConfig, ReviewAgentSpec, ReviewConfig};
use conductor_domain::review::SeverityFilter;
use conductor_domain::safety::SafetyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileSafetyConfig {
    pub max_iterations: Option<u32>,
    pub stagnation_limit: Option<u32>,
    pub max_review_iterations: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReviewAgentConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub prompt_file: Option<PathBuf>,
    #[serde(default)]
    pub focus: Vec<String>,
    pub severity_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileInvokerConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub streaming: Option<bool>,
    pub extra_flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileGitConfig {
    pub auto_branch: Option<bool>,
    pub auto_commit: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub safety: FileSafetyConfig,
    #[serde(default)]
    pub review_agents: Vec<FileReviewAgentConfig>,
    #[serde(default)]
    pub review_parallel: Option<bool>,
    #[serde(default)]
    pub invoker: FileInvokerConfig,
    #[serde(default)]
    pub git: FileGitConfig,
    pub completed_plans_dir: Option<PathBuf>,
    /// Binary used by `TicketCliSource` to read/update externally tracked
    /// tickets; irrelevant for plan-file runs.
    pub ticket_command: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

impl FileConfig {
    /// Collect configuration problems without aborting at the first one,
    /// the same aggregate-then-report shape as the teacher's
    /// `FileConfig::validate`.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for agent in &self.review_agents {
            if agent.name.trim().is_empty() {
                issues.push(ConfigIssue {
                    field: "review_agents[].name".to_string(),
                    message: "review agent name must not be empty".to_string(),
                });
            }
            if agent.command.trim().is_empty() {
                issues.push(ConfigIssue {
                    field: "review_agents[].command".to_string(),
                    message: format!("review agent '{}' has no command", agent.name),
                });
            }
            if let Some(filter) = &agent.severity_filter {
                if SeverityFilter::from_str(filter).is_err() {
                    issues.push(ConfigIssue {
                        field: "review_agents[].severity_filter".to_string(),
                        message: format!(
                            "review agent '{}' has an unrecognized severity_filter: {}",
                            agent.name, filter
                        ),
                    });
                }
            }
        }

        issues
    }

    pub fn to_safety_config(&self) -> SafetyConfig {
        let default = SafetyConfig::default();
        SafetyConfig {
            max_iterations: self.safety.max_iterations.unwrap_or(default.max_iterations),
            stagnation_limit: self
                .safety
                .stagnation_limit
                .unwrap_or(default.stagnation_limit),
            max_review_iterations: self
                .safety
                .max_review_iterations
                .unwrap_or(default.max_review_iterations),
            timeout_seconds: self
                .safety
                .timeout_seconds
                .unwrap_or(default.timeout_seconds),
        }
    }

    pub fn to_review_config(&self) -> ReviewConfig {
        let agents = self
            .review_agents
            .iter()
            .map(|a| ReviewAgentSpec {
                name: a.name.clone(),
                command: a.command.clone(),
                args: a.args.clone(),
                prompt_file: a.prompt_file.clone(),
                focus: a.focus.clone(),
                severity_filter: a
                    .severity_filter
                    .as_deref()
                    .and_then(|s| SeverityFilter::from_str(s).ok())
                    .unwrap_or_default(),
            })
            .collect();
        ReviewConfig {
            agents,
            parallel: self.review_parallel.unwrap_or(true),
        }
    }

    pub fn to_invoker_config(&self) -> InvokerConfig {
        let default = InvokerConfig::default();
        InvokerConfig {
            command: self.invoker.command.clone().unwrap_or(default.command),
            args: self.invoker.args.clone().unwrap_or(default.args),
            streaming: self.invoker.streaming.unwrap_or(default.streaming),
            extra_flags: self
                .invoker
                .extra_flags
                .clone()
                .unwrap_or(default.extra_flags),
        }
    }

    pub fn ticket_command(&self) -> String {
        self.ticket_command.clone().unwrap_or_else(|| "ticket".to_string())
    }

    pub fn to_git_config(&self) -> GitConfig {
        let default = GitConfig::default();
        GitConfig {
            auto_branch: self.git.auto_branch.unwrap_or(default.auto_branch),
            auto_commit: self.git.auto_commit.unwrap_or(default.auto_commit),
        }
    }
}
