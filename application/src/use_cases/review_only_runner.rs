//! Review-Only Runner: reach a passing review on an existing branch without
//! driving any work-item phases. Mirrors the review-fix half of the Task
//! Loop Runner (§4.7 of the design) but with no work item to fetch or
//! update.

use crate::config::RunConfig;
use crate::ports::agent_invoker::{AgentInvoker, InvocationTelemetry, InvokeOptions};
use crate::ports::event_sink::{EventSink, LoopEvent};
use crate::ports::git_helper::GitHelper;
use crate::ports::prompt_builder::PromptBuilder;
use crate::use_cases::review_runner::ReviewRunner;
use conductor_domain::review::format_issues_markdown;
use conductor_domain::safety::{ExitReason, SafetyMonitor, SafetyState};
use conductor_domain::status::parse_status;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReviewOnlyError {
    #[error("no review agents configured")]
    NoReviewAgents,
    #[error("review run failed: {0}")]
    ReviewFailed(String),
    #[error("status block could not be parsed: {0}")]
    StatusParse(String),
}

#[derive(Debug, Clone)]
pub struct ReviewOnlyResult {
    pub passed: bool,
    pub exit_reason: ExitReason,
    pub files_fixed: Vec<String>,
    pub commits_made: u32,
    pub iterations: u32,
}

pub struct ReviewOnlyRunner {
    invoker: Arc<dyn AgentInvoker>,
    review_runner: Arc<ReviewRunner>,
    prompt_builder: Arc<dyn PromptBuilder>,
    git: Arc<dyn GitHelper>,
    events: Arc<dyn EventSink>,
    config: RunConfig,
}

impl ReviewOnlyRunner {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        review_runner: Arc<ReviewRunner>,
        prompt_builder: Arc<dyn PromptBuilder>,
        git: Arc<dyn GitHelper>,
        events: Arc<dyn EventSink>,
        config: RunConfig,
    ) -> Self {
        Self {
            invoker,
            review_runner,
            prompt_builder,
            git,
            events,
            config,
        }
    }

    pub async fn run(
        &self,
        base_branch: &str,
        mut files_changed: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<ReviewOnlyResult, ReviewOnlyError> {
        if self.config.review.is_empty() {
            return Err(ReviewOnlyError::NoReviewAgents);
        }

        let mut safety_state = SafetyState::new();
        let mut files_fixed: Vec<String> = Vec::new();
        let mut commits_made = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Ok(ReviewOnlyResult {
                    passed: false,
                    exit_reason: ExitReason::UserInterrupt,
                    files_fixed,
                    commits_made,
                    iterations: safety_state.iteration,
                });
            }

            safety_state.iteration += 1;
            let verdict = SafetyMonitor::check(&self.config.safety, &safety_state);
            if verdict.should_exit {
                return Ok(ReviewOnlyResult {
                    passed: false,
                    exit_reason: verdict.reason.unwrap_or(ExitReason::Error),
                    files_fixed,
                    commits_made,
                    iterations: safety_state.iteration,
                });
            }

            self.events.emit(LoopEvent::ReviewStarted {
                review_iteration: safety_state.iteration,
            });
            let run_result = self
                .review_runner
                .run_iteration(&self.config.working_dir, &files_changed, cancel.clone())
                .await
                .map_err(|e| ReviewOnlyError::ReviewFailed(e.to_string()))?;
            self.events.emit(LoopEvent::ReviewResult {
                result: run_result.clone(),
            });

            if run_result.agent_error_count() > 0 {
                safety_state.record_iteration(false, "review agent error");
                if safety_state.iteration >= self.config.safety.max_review_iterations {
                    return Ok(ReviewOnlyResult {
                        passed: false,
                        exit_reason: ExitReason::Error,
                        files_fixed,
                        commits_made,
                        iterations: safety_state.iteration,
                    });
                }
                continue;
            }

            if run_result.passed {
                return Ok(ReviewOnlyResult {
                    passed: true,
                    exit_reason: ExitReason::Complete,
                    files_fixed,
                    commits_made,
                    iterations: safety_state.iteration,
                });
            }

            let issues_markdown = format_issues_markdown(&run_result.results);
            let prompt = self
                .prompt_builder
                .review_only_fix_prompt(base_branch, &issues_markdown);

            let telemetry = InvocationTelemetry::new();
            let mut invoke_options = InvokeOptions::new(
                self.config.working_dir.clone(),
                std::time::Duration::from_secs(self.config.safety.timeout_seconds),
                cancel.clone(),
            );
            telemetry.wire(&mut invoke_options);
            let invoke_result = self.invoker.invoke(&prompt, invoke_options).await;
            let (model, tokens) = telemetry.into_parts();
            if let Some(model) = model {
                safety_state.record_model(model);
            }
            if tokens > 0 {
                safety_state.record_tokens(tokens);
            }

            let output = match invoke_result {
                Ok(output) => output,
                Err(e) => {
                    safety_state.record_iteration(false, &format!("invocation error: {e}"));
                    warn!("agent invocation failed during review fix: {e}");
                    continue;
                }
            };

            let parsed = parse_status(&output.text).map_err(ReviewOnlyError::StatusParse)?;
            let commit_made_by_agent = parsed.as_ref().map(|s| s.commit_made).unwrap_or(false);
            let summary = parsed
                .as_ref()
                .map(|s| s.summary.clone())
                .unwrap_or_else(|| "no status reported".to_string());

            if let Some(status) = &parsed {
                if status.status == Some(conductor_domain::status::TaskStatus::Blocked) {
                    return Ok(ReviewOnlyResult {
                        passed: false,
                        exit_reason: ExitReason::Blocked,
                        files_fixed,
                        commits_made,
                        iterations: safety_state.iteration,
                    });
                }
                for f in &status.files_changed {
                    if !files_fixed.contains(f) {
                        files_fixed.push(f.clone());
                    }
                }
                safety_state.record_iteration(!status.files_changed.is_empty(), &summary);

                if commit_made_by_agent {
                    commits_made += 1;
                } else if self.config.git.auto_commit && !status.files_changed.is_empty() {
                    let message = if status.summary.trim().is_empty() {
                        "fix: review fixes".to_string()
                    } else {
                        format!("fix: {}", status.summary)
                    };
                    if self
                        .git
                        .commit_files(&self.config.working_dir, &status.files_changed, &message)
                        .await
                        .is_ok()
                    {
                        commits_made += 1;
                    }
                }
            } else {
                safety_state.record_iteration(false, "no status reported");
            }

            if let Ok(refreshed) = self.git.changed_files(&self.config.working_dir) {
                files_changed = refreshed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_invoker::{AgentInvoker, InvokeOptions, InvokeOutput, InvokerError};
    use crate::ports::event_sink::NoopEventSink;
    use crate::ports::git_helper::{GitError, GitHelper};
    use crate::ports::prompt_builder::DefaultPromptBuilder;
    use crate::ports::review_agent::{ReviewAgent, ReviewAgentError};
    use crate::use_cases::review_runner::ReviewRunner;
    use async_trait::async_trait;
    use conductor_domain::review::{Issue, ReviewResult as DomainReviewResult, Severity};
    use conductor_domain::safety::SafetyConfig;
    use conductor_domain::status::{ParsedStatus, TaskStatus, encode_status};
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    fn status_block(status: TaskStatus, files: Vec<&str>, summary: &str) -> String {
        encode_status(&ParsedStatus {
            phase_completed: None,
            status: Some(status),
            files_changed: files.into_iter().map(String::from).collect(),
            summary: summary.to_string(),
            error: None,
            commit_made: false,
        })
    }

    struct ScriptedInvoker {
        turns: Mutex<std::collections::VecDeque<String>>,
    }

    impl ScriptedInvoker {
        fn new(turns: Vec<String>) -> Self {
            Self {
                turns: Mutex::new(turns.into()),
            }
        }
    }

    #[async_trait]
    impl AgentInvoker for ScriptedInvoker {
        async fn invoke(
            &self,
            _prompt: &str,
            _options: InvokeOptions<'_>,
        ) -> Result<InvokeOutput, InvokerError> {
            let mut turns = self.turns.lock().await;
            let text = turns
                .pop_front()
                .unwrap_or_else(|| status_block(TaskStatus::Continue, vec![], "idle"));
            Ok(InvokeOutput { text })
        }
    }

    struct FakeGit {
        commits: AtomicU32,
    }

    impl FakeGit {
        fn new() -> Self {
            Self {
                commits: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GitHelper for FakeGit {
        fn current_branch(&self, _working_dir: &Path) -> Result<String, GitError> {
            Ok("main".to_string())
        }

        fn changed_files(&self, _working_dir: &Path) -> Result<Vec<String>, GitError> {
            Ok(vec![])
        }

        async fn checkout_branch(&self, _working_dir: &Path, _branch: &str) -> Result<(), GitError> {
            Ok(())
        }

        async fn commit_files(
            &self,
            _working_dir: &Path,
            _files: &[String],
            _message: &str,
        ) -> Result<(), GitError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn move_and_commit(
            &self,
            _working_dir: &Path,
            _from: &Path,
            to: &std::path::Path,
            _message: &str,
        ) -> Result<std::path::PathBuf, GitError> {
            Ok(to.to_path_buf())
        }
    }

    struct ScriptedReviewAgent {
        name: String,
        verdicts: Mutex<std::collections::VecDeque<DomainReviewResult>>,
        last: DomainReviewResult,
    }

    impl ScriptedReviewAgent {
        fn new(name: &str, verdicts: Vec<DomainReviewResult>) -> Self {
            let last = verdicts.last().cloned().unwrap_or_default();
            Self {
                name: name.to_string(),
                verdicts: Mutex::new(verdicts.into()),
                last,
            }
        }
    }

    #[async_trait]
    impl ReviewAgent for ScriptedReviewAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn review(
            &self,
            _working_dir: &Path,
            _files_changed: &[String],
            _cancel: tokio_util::sync::CancellationToken,
        ) -> Result<DomainReviewResult, ReviewAgentError> {
            let mut verdicts = self.verdicts.lock().await;
            Ok(verdicts.pop_front().unwrap_or_else(|| self.last.clone()))
        }
    }

    fn make_runner(
        invoker: Arc<dyn AgentInvoker>,
        review_agents: Vec<Arc<dyn ReviewAgent>>,
        git: Arc<dyn GitHelper>,
        safety: SafetyConfig,
    ) -> ReviewOnlyRunner {
        let review_config = crate::config::ReviewConfig {
            agents: vec![crate::config::ReviewAgentSpec {
                name: "reviewer".into(),
                command: "true".into(),
                args: vec![],
                prompt_file: None,
                focus: vec![],
                severity_filter: conductor_domain::review::SeverityFilter::All,
            }],
            parallel: true,
        };
        let review_runner = Arc::new(ReviewRunner::new(review_agents, review_config.clone()));
        let config = RunConfig {
            safety,
            review: review_config,
            invoker: crate::config::InvokerConfig::default(),
            git: crate::config::GitConfig {
                auto_branch: false,
                auto_commit: true,
            },
            working_dir: std::path::PathBuf::from("."),
            completed_plans_dir: None,
        };
        ReviewOnlyRunner::new(
            invoker,
            review_runner,
            Arc::new(DefaultPromptBuilder),
            git,
            Arc::new(NoopEventSink),
            config,
        )
    }

    #[tokio::test]
    async fn passes_immediately_when_no_issues() {
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::new(
            "reviewer",
            vec![DomainReviewResult {
                agent_name: "reviewer".into(),
                issues: vec![],
                summary: "clean".into(),
                error: None,
            }],
        ));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![]));
        let git: Arc<dyn GitHelper> = Arc::new(FakeGit::new());
        let runner = make_runner(invoker, vec![reviewer], git, SafetyConfig::default());

        let result = runner
            .run("main", vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.exit_reason, ExitReason::Complete);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn fixes_issues_then_passes_and_auto_commits() {
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::new(
            "reviewer",
            vec![
                DomainReviewResult {
                    agent_name: "reviewer".into(),
                    issues: vec![Issue {
                        file: "a.rs".into(),
                        line: None,
                        severity: Severity::High,
                        description: "bug".into(),
                        agent_name: "reviewer".into(),
                    }],
                    summary: "found a bug".into(),
                    error: None,
                },
                DomainReviewResult {
                    agent_name: "reviewer".into(),
                    issues: vec![],
                    summary: "clean".into(),
                    error: None,
                },
            ],
        ));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![status_block(
            TaskStatus::Continue,
            vec!["a.rs"],
            "fixed the bug",
        )]));
        let git = Arc::new(FakeGit::new());
        let git_dyn: Arc<dyn GitHelper> = git.clone();
        let runner = make_runner(invoker, vec![reviewer], git_dyn, SafetyConfig::default());

        let result = runner
            .run("main", vec!["a.rs".to_string()], CancellationToken::new())
            .await
            .unwrap();

        assert!(result.passed);
        assert_eq!(result.files_fixed, vec!["a.rs".to_string()]);
        assert_eq!(result.commits_made, 1);
        assert_eq!(git.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocked_during_fix_exits_blocked() {
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::new(
            "reviewer",
            vec![DomainReviewResult {
                agent_name: "reviewer".into(),
                issues: vec![Issue {
                    file: "a.rs".into(),
                    line: None,
                    severity: Severity::Critical,
                    description: "bug".into(),
                    agent_name: "reviewer".into(),
                }],
                summary: "bad".into(),
                error: None,
            }],
        ));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![encode_status(
            &ParsedStatus {
                phase_completed: None,
                status: Some(TaskStatus::Blocked),
                files_changed: vec![],
                summary: String::new(),
                error: Some("needs human input".into()),
                commit_made: false,
            },
        )]));
        let git: Arc<dyn GitHelper> = Arc::new(FakeGit::new());
        let runner = make_runner(invoker, vec![reviewer], git, SafetyConfig::default());

        let result = runner
            .run("main", vec![], CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.passed);
        assert_eq!(result.exit_reason, ExitReason::Blocked);
    }

    #[tokio::test]
    async fn no_review_agents_is_fatal() {
        let review_config = crate::config::ReviewConfig {
            agents: vec![],
            parallel: true,
        };
        let review_runner = Arc::new(ReviewRunner::new(vec![], review_config.clone()));
        let config = RunConfig {
            safety: SafetyConfig::default(),
            review: review_config,
            invoker: crate::config::InvokerConfig::default(),
            git: crate::config::GitConfig {
                auto_branch: false,
                auto_commit: true,
            },
            working_dir: std::path::PathBuf::from("."),
            completed_plans_dir: None,
        };
        let runner = ReviewOnlyRunner::new(
            Arc::new(ScriptedInvoker::new(vec![])),
            review_runner,
            Arc::new(DefaultPromptBuilder),
            Arc::new(FakeGit::new()),
            Arc::new(NoopEventSink),
            config,
        );

        let err = runner.run("main", vec![], CancellationToken::new()).await;

        assert!(matches!(err, Err(ReviewOnlyError::NoReviewAgents)));
    }
}
