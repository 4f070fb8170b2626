//! Review Runner: fans a review iteration out across every configured
//! review agent, in parallel or sequentially, and merges the results.
//!
//! The parallel path is a direct generalization of the teacher's
//! `review_plan`/`review_action`/`final_review` methods: spawn one task per
//! participant in a `JoinSet`, race the join against a cancellation token,
//! and on cancellation abort every still-running task.

use crate::config::ReviewConfig;
use crate::ports::review_agent::ReviewAgent;
use conductor_domain::review::{ReviewResult, RunResult, merge_results};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReviewRunError {
    #[error("review run cancelled")]
    Cancelled,
}

pub struct ReviewRunner {
    agents: Vec<Arc<dyn ReviewAgent>>,
    config: ReviewConfig,
}

impl ReviewRunner {
    pub fn new(agents: Vec<Arc<dyn ReviewAgent>>, config: ReviewConfig) -> Self {
        Self { agents, config }
    }

    /// Run one review iteration over `files_changed`, fanning agents out
    /// according to `config.parallel`. Per-agent failures are captured into
    /// that agent's `ReviewResult.error`, never propagated — the returned
    /// `RunResult` always covers every configured agent, in configured
    /// order, regardless of completion order.
    pub async fn run_iteration(
        &self,
        working_dir: &Path,
        files_changed: &[String],
        cancel: CancellationToken,
    ) -> Result<RunResult, ReviewRunError> {
        let results = if self.config.parallel {
            self.run_parallel(working_dir, files_changed, cancel.clone())
                .await?
        } else {
            self.run_sequential(working_dir, files_changed, cancel.clone())
                .await
        };

        // Filter by the strictest agent-specific severity filter configured;
        // per-agent filters are applied before merge so each agent's own
        // threshold governs its own issues.
        let mut filtered = Vec::with_capacity(results.len());
        for (i, mut result) in results.into_iter().enumerate() {
            if let Some(spec) = self.config.agents.get(i) {
                result.issues.retain(|issue| spec.severity_filter.keeps(issue));
            }
            filtered.push(result);
        }

        Ok(merge_results(filtered, conductor_domain::review::SeverityFilter::All))
    }

    async fn run_parallel(
        &self,
        working_dir: &Path,
        files_changed: &[String],
        cancel: CancellationToken,
    ) -> Result<Vec<ReviewResult>, ReviewRunError> {
        let mut join_set: JoinSet<(usize, ReviewResult)> = JoinSet::new();

        for (index, agent) in self.agents.iter().cloned().enumerate() {
            let working_dir = working_dir.to_path_buf();
            let files_changed = files_changed.to_vec();
            let agent_cancel = cancel.clone();
            join_set.spawn(async move {
                let agent_cancel2 = agent_cancel.clone();
                let outcome = agent
                    .review(&working_dir, &files_changed, agent_cancel)
                    .await;
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => ReviewResult {
                        agent_name: agent.name().to_string(),
                        issues: Vec::new(),
                        summary: String::new(),
                        error: Some(e.to_string()),
                    },
                };
                let _ = agent_cancel2;
                (index, result)
            });
        }

        let mut ordered: Vec<Option<ReviewResult>> = (0..self.agents.len()).map(|_| None).collect();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    // Drain aborted tasks so resources are released before we
                    // record them as cancellation errors.
                    while join_set.join_next().await.is_some() {}
                    for (i, slot) in ordered.iter_mut().enumerate() {
                        if slot.is_none() {
                            *slot = Some(ReviewResult {
                                agent_name: self.agents.get(i).map(|a| a.name().to_string()).unwrap_or_default(),
                                issues: Vec::new(),
                                summary: String::new(),
                                error: Some("review agent cancelled".to_string()),
                            });
                        }
                    }
                    return Err(ReviewRunError::Cancelled);
                }
                joined = join_set.join_next() => {
                    match joined {
                        Some(Ok((index, result))) => {
                            ordered[index] = Some(result);
                        }
                        Some(Err(join_error)) => {
                            warn!("review agent task panicked: {join_error}");
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(ordered
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.unwrap_or_else(|| ReviewResult {
                    agent_name: self
                        .agents
                        .get(i)
                        .map(|a| a.name().to_string())
                        .unwrap_or_default(),
                    issues: Vec::new(),
                    summary: String::new(),
                    error: Some("review agent task did not complete".to_string()),
                })
            })
            .collect())
    }

    async fn run_sequential(
        &self,
        working_dir: &Path,
        files_changed: &[String],
        cancel: CancellationToken,
    ) -> Vec<ReviewResult> {
        let mut results = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            if cancel.is_cancelled() {
                results.push(ReviewResult {
                    agent_name: agent.name().to_string(),
                    issues: Vec::new(),
                    summary: String::new(),
                    error: Some("review agent cancelled".to_string()),
                });
                continue;
            }
            let outcome = agent.review(working_dir, files_changed, cancel.clone()).await;
            results.push(match outcome {
                Ok(result) => result,
                Err(e) => ReviewResult {
                    agent_name: agent.name().to_string(),
                    issues: Vec::new(),
                    summary: String::new(),
                    error: Some(e.to_string()),
                },
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::review_agent::ReviewAgentError;
    use async_trait::async_trait;
    use conductor_domain::review::{Issue, Severity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAgent {
        name: String,
        fail: bool,
        delay_ms: u64,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReviewAgent for FakeAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn review(
            &self,
            _working_dir: &Path,
            _files_changed: &[String],
            _cancel: CancellationToken,
        ) -> Result<ReviewResult, ReviewAgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                return Err(ReviewAgentError::SpawnFailed("boom".into()));
            }
            Ok(ReviewResult {
                agent_name: self.name.clone(),
                issues: vec![Issue {
                    file: "src/main.rs".into(),
                    line: None,
                    severity: Severity::Low,
                    description: "nit".into(),
                    agent_name: self.name.clone(),
                }],
                summary: "ok".into(),
                error: None,
            })
        }
    }

    #[tokio::test]
    async fn parallel_preserves_configured_order_regardless_of_completion_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agents: Vec<Arc<dyn ReviewAgent>> = vec![
            Arc::new(FakeAgent {
                name: "slow".into(),
                fail: false,
                delay_ms: 30,
                calls: calls.clone(),
            }),
            Arc::new(FakeAgent {
                name: "fast".into(),
                fail: false,
                delay_ms: 0,
                calls: calls.clone(),
            }),
        ];
        let runner = ReviewRunner::new(agents, ReviewConfig {
            agents: vec![],
            parallel: true,
        });
        let result = runner
            .run_iteration(Path::new("."), &[], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.results[0].agent_name, "slow");
        assert_eq!(result.results[1].agent_name, "fast");
    }

    #[tokio::test]
    async fn agent_error_is_captured_not_propagated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agents: Vec<Arc<dyn ReviewAgent>> = vec![
            Arc::new(FakeAgent {
                name: "broken".into(),
                fail: true,
                delay_ms: 0,
                calls: calls.clone(),
            }),
            Arc::new(FakeAgent {
                name: "ok".into(),
                fail: false,
                delay_ms: 0,
                calls,
            }),
        ];
        let runner = ReviewRunner::new(agents, ReviewConfig {
            agents: vec![],
            parallel: false,
        });
        let result = runner
            .run_iteration(Path::new("."), &[], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.results.len(), 2);
        assert!(result.results[0].error.is_some());
        assert!(result.results[1].error.is_none());
    }

    #[tokio::test]
    async fn passes_when_no_issues_survive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let agents: Vec<Arc<dyn ReviewAgent>> = vec![Arc::new(FakeAgent {
            name: "clean".into(),
            fail: false,
            delay_ms: 0,
            calls,
        })];
        // no issues case: use an agent returning no issues by faking via severity filter min:critical
        let runner = ReviewRunner::new(
            agents,
            ReviewConfig {
                agents: vec![crate::config::ReviewAgentSpec {
                    name: "clean".into(),
                    command: "true".into(),
                    args: vec![],
                    prompt_file: None,
                    focus: vec![],
                    severity_filter: conductor_domain::review::SeverityFilter::MinSeverity(
                        Severity::Critical,
                    ),
                }],
                parallel: true,
            },
        );
        let result = runner
            .run_iteration(Path::new("."), &[], CancellationToken::new())
            .await
            .unwrap();
        assert!(result.passed);
    }
}
