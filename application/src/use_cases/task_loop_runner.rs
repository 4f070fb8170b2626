//! Task Loop Runner: drives the [`Engine`] by invoking the coding agent,
//! parsing its status, applying side effects, and enforcing safety limits,
//! then handing off to the review-fix cycle once the work item's phases are
//! done.

use crate::config::RunConfig;
use crate::ports::agent_invoker::{AgentInvoker, InvocationTelemetry, InvokeOptions, InvokerError};
use crate::ports::event_sink::{EventSink, LoopEvent};
use crate::ports::git_helper::GitHelper;
use crate::ports::prompt_builder::PromptBuilder;
use crate::ports::work_source::{Mover, SourceError, WorkSource};
use crate::use_cases::review_runner::ReviewRunner;
use conductor_domain::engine::Engine;
use conductor_domain::review::format_issues_markdown;
use conductor_domain::safety::{ExitReason, SafetyMonitor, SafetyState};
use conductor_domain::status::parse_status;
use conductor_domain::work_item::WorkItemStatus;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const MAX_CONSECUTIVE_INVOCATION_ERRORS: u32 = 3;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("no review agents configured")]
    NoReviewAgents,
    #[error("review run failed: {0}")]
    ReviewFailed(String),
    #[error("status block could not be parsed: {0}")]
    StatusParse(String),
}

#[derive(Debug, Clone)]
pub struct LoopResult {
    pub exit_reason: ExitReason,
    pub message: String,
    pub iterations: u32,
    pub total_files_changed: Vec<String>,
}

pub struct TaskLoopRunner {
    source: Arc<dyn WorkSource>,
    mover: Option<Arc<dyn Mover>>,
    invoker: Arc<dyn AgentInvoker>,
    review_runner: Arc<ReviewRunner>,
    prompt_builder: Arc<dyn PromptBuilder>,
    git: Arc<dyn GitHelper>,
    events: Arc<dyn EventSink>,
    config: RunConfig,
}

impl TaskLoopRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn WorkSource>,
        mover: Option<Arc<dyn Mover>>,
        invoker: Arc<dyn AgentInvoker>,
        review_runner: Arc<ReviewRunner>,
        prompt_builder: Arc<dyn PromptBuilder>,
        git: Arc<dyn GitHelper>,
        events: Arc<dyn EventSink>,
        config: RunConfig,
    ) -> Self {
        Self {
            source,
            mover,
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
        work_item_id: &str,
        cancel: CancellationToken,
    ) -> Result<LoopResult, RunError> {
        if self.config.review.is_empty() {
            return Err(RunError::NoReviewAgents);
        }

        self.events.emit(LoopEvent::Started {
            work_item_id: work_item_id.to_string(),
        });
        self.source
            .set_status(work_item_id, WorkItemStatus::InProgress)
            .await?;

        if self.config.git.auto_branch {
            let branch = sanitize_branch_name(work_item_id);
            if let Err(e) = self
                .git
                .checkout_branch(&self.config.working_dir, &branch)
                .await
            {
                warn!("auto-branch checkout failed, continuing on current branch: {e}");
            }
        }

        let mut engine = Engine::new(self.config.safety, false);
        let mut safety_state = SafetyState::new();
        let mut total_files_changed: Vec<String> = Vec::new();
        let mut consecutive_invocation_errors = 0u32;
        let mut pending_issues_markdown = String::new();
        // Phaseless work items have no checkbox to flip; the agent's own
        // `DONE` report is the only signal that there is no more task work.
        let mut task_completed = false;

        loop {
            if cancel.is_cancelled() {
                return Ok(self.exit(ExitReason::UserInterrupt, "cancelled by caller", &safety_state, total_files_changed));
            }

            let work_item = self.source.get(work_item_id).await?;

            let work_is_done = work_item.all_phases_complete()
                || (work_item.is_phaseless() && task_completed)
                || engine.review_only_mode;

            if work_is_done && !engine.pending_review_fix {
                if engine.review_passed {
                    self.finish_complete(work_item_id).await;
                    return Ok(self.exit(ExitReason::Complete, "work item complete and review passed", &safety_state, total_files_changed));
                }

                match self
                    .run_review_cycle(
                        work_item_id,
                        &mut engine,
                        &mut safety_state,
                        &mut pending_issues_markdown,
                        &total_files_changed,
                        cancel.clone(),
                    )
                    .await
                {
                    Ok(Some(loop_result)) => return Ok(loop_result),
                    Ok(None) => {
                        if engine.review_passed {
                            self.finish_complete(work_item_id).await;
                            return Ok(self.exit(ExitReason::Complete, "review passed", &safety_state, total_files_changed));
                        }
                        // needs-fix: fall through to invoke the agent below.
                    }
                    Err(e) => return Err(e),
                }
            }

            safety_state.iteration += 1;
            self.events.emit(LoopEvent::IterationStarted {
                iteration: safety_state.iteration,
            });
            let verdict = SafetyMonitor::check(&self.config.safety, &safety_state);
            if verdict.should_exit {
                let reason = verdict.reason.unwrap_or(ExitReason::Error);
                let message = verdict.message.unwrap_or_default();
                let _ = self.source.add_note(work_item_id, &message).await;
                return Ok(self.exit(reason, &message, &safety_state, total_files_changed));
            }

            let prompt = if engine.pending_review_fix {
                self.prompt_builder
                    .review_fix_prompt(&work_item, &pending_issues_markdown)
            } else {
                self.prompt_builder.task_prompt(&work_item)
            };

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
                Ok(output) => {
                    consecutive_invocation_errors = 0;
                    output
                }
                Err(e) => {
                    consecutive_invocation_errors += 1;
                    safety_state.record_iteration(false, &format!("invocation error: {e}"));
                    warn!("agent invocation failed: {e}");
                    if consecutive_invocation_errors >= MAX_CONSECUTIVE_INVOCATION_ERRORS {
                        return Ok(self.exit(
                            ExitReason::Error,
                            &format!(
                                "{MAX_CONSECUTIVE_INVOCATION_ERRORS} consecutive invocation failures, last error: {e}"
                            ),
                            &safety_state,
                            total_files_changed,
                        ));
                    }
                    continue;
                }
            };

            self.events.emit(LoopEvent::AgentOutput {
                text: output.text.clone(),
            });

            let parsed = match parse_status(&output.text) {
                Ok(parsed) => parsed,
                Err(e) => return Err(RunError::StatusParse(e)),
            };

            let files_changed_now = parsed
                .as_ref()
                .map(|s| !s.files_changed.is_empty())
                .unwrap_or(false);
            let summary = parsed
                .as_ref()
                .map(|s| s.summary.clone())
                .unwrap_or_else(|| "no status reported".to_string());
            safety_state.record_iteration(files_changed_now, &summary);

            let status_result = engine.process_status(parsed.as_ref());

            for file in &status_result.files_changed {
                if !total_files_changed.contains(file) {
                    total_files_changed.push(file.clone());
                }
            }

            if let Some(phase_name) = &status_result.phase_completed {
                self.source.update_phase(work_item_id, phase_name).await?;
                self.events.emit(LoopEvent::PhaseCompleted {
                    phase_name: phase_name.clone(),
                });
                let _ = self
                    .source
                    .add_note(work_item_id, &format!("completed phase: {phase_name}"))
                    .await;
                if self.config.git.auto_commit && !status_result.files_changed.is_empty() {
                    if let Err(e) = self
                        .git
                        .commit_files(
                            &self.config.working_dir,
                            &status_result.files_changed,
                            phase_name,
                        )
                        .await
                    {
                        warn!("auto-commit failed: {e}");
                    }
                }
            } else if !status_result.summary.is_empty() {
                let _ = self.source.add_note(work_item_id, &status_result.summary).await;
            }

            if status_result.reset_pending_review_fix {
                engine.pending_review_fix = false;
                pending_issues_markdown.clear();
            }

            if status_result.task_completed {
                task_completed = true;
            }

            if status_result.should_exit {
                let reason = status_result.exit_reason.unwrap_or(ExitReason::Error);
                let message = parsed
                    .and_then(|s| s.error)
                    .unwrap_or_else(|| "agent reported blocked".to_string());
                let _ = self.source.add_note(work_item_id, &message).await;
                return Ok(self.exit(reason, &message, &safety_state, total_files_changed));
            }
        }
    }

    /// §4.7: run one review iteration when the task's phases are done but
    /// the review hasn't passed yet. Returns `Ok(Some(result))` if the
    /// caller should return immediately (terminal exit), `Ok(None)` if the
    /// outer loop should continue (either review passed — caller checks
    /// `engine.review_passed` — or a fix is now pending).
    async fn run_review_cycle(
        &self,
        work_item_id: &str,
        engine: &mut Engine,
        safety_state: &mut SafetyState,
        pending_issues_markdown: &mut String,
        total_files_changed: &[String],
        cancel: CancellationToken,
    ) -> Result<Option<LoopResult>, RunError> {
        if self.config.review.is_empty() {
            return Err(RunError::NoReviewAgents);
        }

        let max_review_iter = self.config.safety.max_review_iterations;
        if max_review_iter > 0 && engine.review_iterations >= max_review_iter {
            // soft cap: treat as complete without failing the run
            warn!("review budget of {max_review_iter} iterations exhausted; completing anyway");
            let _ = self
                .source
                .add_note(work_item_id, "Review iteration limit reached")
                .await;
            engine.review_passed = true;
            return Ok(None);
        }

        engine.review_iterations += 1;
        safety_state.in_review_phase = true;
        self.events.emit(LoopEvent::ReviewStarted {
            review_iteration: engine.review_iterations,
        });

        let run_result = self
            .review_runner
            .run_iteration(&self.config.working_dir, total_files_changed, cancel)
            .await
            .map_err(|e| RunError::ReviewFailed(e.to_string()))?;

        self.events.emit(LoopEvent::ReviewResult {
            result: run_result.clone(),
        });

        if run_result.agent_error_count() > 0 {
            safety_state.record_iteration(false, "review agent error");
            let verdict = SafetyMonitor::check(&self.config.safety, safety_state);
            if verdict.should_exit {
                return Ok(Some(self.exit(
                    verdict.reason.unwrap_or(ExitReason::Error),
                    &verdict.message.unwrap_or_default(),
                    safety_state,
                    total_files_changed.to_vec(),
                )));
            }
            // Don't burn the review budget on an agent failure.
            engine.review_iterations = engine.review_iterations.saturating_sub(1);
            engine.pending_review_fix = false;
            engine.review_passed = false;
            return Ok(None);
        }

        safety_state.consecutive_no_changes = 0;
        let decision = engine.decide_review(run_result.passed);
        if decision.passed {
            info!("review passed after {} iteration(s)", engine.review_iterations);
            let _ = self
                .source
                .add_note(
                    work_item_id,
                    &format!("Review passed after {} iteration(s)", engine.review_iterations),
                )
                .await;
            return Ok(None);
        }

        *pending_issues_markdown = format_issues_markdown(&run_result.results);
        Ok(None)
    }

    async fn finish_complete(&self, work_item_id: &str) {
        let _ = self
            .source
            .set_status(work_item_id, WorkItemStatus::Closed)
            .await;
        if let Some(mover) = &self.mover {
            if let Some(dest_dir) = &self.config.completed_plans_dir {
                match mover.move_to(work_item_id, dest_dir).await {
                    Ok(new_path) => {
                        if self.config.git.auto_commit {
                            if let Some(old_path) = mover.file_path(work_item_id) {
                                let _ = self
                                    .git
                                    .move_and_commit(
                                        &self.config.working_dir,
                                        &old_path,
                                        &new_path,
                                        "chore: move completed plan",
                                    )
                                    .await;
                            }
                        }
                    }
                    Err(e) => warn!("failed to move completed plan: {e}"),
                }
            }
        }
    }

    fn exit(
        &self,
        reason: ExitReason,
        message: &str,
        safety_state: &SafetyState,
        total_files_changed: Vec<String>,
    ) -> LoopResult {
        self.events.emit(LoopEvent::Exited {
            reason,
            message: message.to_string(),
        });
        LoopResult {
            exit_reason: reason,
            message: message.to_string(),
            iterations: safety_state.iteration,
            total_files_changed,
        }
    }
}

fn sanitize_branch_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 8);
    out.push_str("conductor/");
    for c in id.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push('-');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::agent_invoker::{AgentInvoker, InvokeOptions, InvokeOutput, InvokerError};
    use crate::ports::event_sink::NoopEventSink;
    use crate::ports::git_helper::{GitError, GitHelper};
    use crate::ports::prompt_builder::DefaultPromptBuilder;
    use crate::ports::review_agent::{ReviewAgent, ReviewAgentError};
    use crate::ports::work_source::{Mover, SourceError, WorkSource};
    use async_trait::async_trait;
    use conductor_domain::review::{Issue, ReviewResult as DomainReviewResult, Severity};
    use conductor_domain::safety::SafetyConfig;
    use conductor_domain::status::{ParsedStatus, TaskStatus, encode_status};
    use conductor_domain::work_item::{Phase, WorkItem, WorkItemKind, WorkItemStatus};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Mutex;

    #[test]
    fn sanitizes_branch_names() {
        assert_eq!(sanitize_branch_name("plans/Add Widgets.md"), "conductor/plans-add-widgets-md");
    }

    fn status_block(
        phase: Option<&str>,
        status: TaskStatus,
        files: Vec<&str>,
        summary: &str,
    ) -> String {
        encode_status(&ParsedStatus {
            phase_completed: phase.map(String::from),
            status: Some(status),
            files_changed: files.into_iter().map(String::from).collect(),
            summary: summary.to_string(),
            error: None,
            commit_made: false,
        })
    }

    fn blocked_block(error: &str) -> String {
        encode_status(&ParsedStatus {
            phase_completed: None,
            status: Some(TaskStatus::Blocked),
            files_changed: vec![],
            summary: String::new(),
            error: Some(error.to_string()),
            commit_made: false,
        })
    }

    /// In-memory work source backing a two-phase plan, mutated in place the
    /// way a real plan file is rewritten on disk between iterations.
    struct FakeSource {
        item: StdMutex<WorkItem>,
        notes: StdMutex<Vec<String>>,
    }

    impl FakeSource {
        fn new(phases: Vec<&str>) -> Self {
            Self {
                item: StdMutex::new(WorkItem {
                    id: "w1".into(),
                    title: "Test plan".into(),
                    status: WorkItemStatus::Open,
                    kind: WorkItemKind::Plan,
                    phases: phases.into_iter().map(Phase::new).collect(),
                    raw_content: String::new(),
                    validation_commands: vec![],
                }),
                notes: StdMutex::new(Vec::new()),
            }
        }

        fn notes(&self) -> Vec<String> {
            self.notes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkSource for FakeSource {
        async fn get(&self, _id: &str) -> Result<WorkItem, SourceError> {
            Ok(self.item.lock().unwrap().clone())
        }

        async fn update_phase(&self, _id: &str, phase_name: &str) -> Result<(), SourceError> {
            let mut item = self.item.lock().unwrap();
            if let Some(phase) = item.phases.iter_mut().find(|p| p.name == phase_name) {
                phase.completed = true;
            }
            Ok(())
        }

        async fn add_note(&self, _id: &str, note: &str) -> Result<(), SourceError> {
            self.notes.lock().unwrap().push(note.to_string());
            Ok(())
        }

        async fn set_status(&self, _id: &str, status: WorkItemStatus) -> Result<(), SourceError> {
            self.item.lock().unwrap().status = status;
            Ok(())
        }

        fn kind(&self) -> WorkItemKind {
            WorkItemKind::Plan
        }
    }

    struct NoopMover;

    #[async_trait]
    impl Mover for NoopMover {
        fn file_path(&self, _id: &str) -> Option<PathBuf> {
            None
        }

        async fn move_to(&self, _id: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
            Ok(dest_dir.to_path_buf())
        }
    }

    /// Scripted invoker: replays a fixed queue of canned turns, one per call.
    /// Each turn is either a status-block string or an invocation error.
    struct ScriptedInvoker {
        turns: Mutex<std::collections::VecDeque<Result<String, String>>>,
    }

    impl ScriptedInvoker {
        fn new(turns: Vec<Result<String, String>>) -> Self {
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
            match turns.pop_front() {
                Some(Ok(text)) => Ok(InvokeOutput { text }),
                Some(Err(e)) => Err(InvokerError::SpawnFailed(e)),
                None => Ok(InvokeOutput {
                    text: status_block(None, TaskStatus::Continue, vec![], "idle"),
                }),
            }
        }
    }

    struct FakeGit;

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
            Ok(())
        }

        async fn move_and_commit(
            &self,
            _working_dir: &Path,
            _from: &Path,
            to: &Path,
            _message: &str,
        ) -> Result<PathBuf, GitError> {
            Ok(to.to_path_buf())
        }
    }

    /// Review agent that replays one canned `ReviewResult` per call, looping
    /// the last entry once the queue is drained.
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

        fn always_passes(name: &str) -> Self {
            Self::new(
                name,
                vec![DomainReviewResult {
                    agent_name: name.to_string(),
                    issues: vec![],
                    summary: "clean".into(),
                    error: None,
                }],
            )
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
            _cancel: CancellationToken,
        ) -> Result<DomainReviewResult, ReviewAgentError> {
            let mut verdicts = self.verdicts.lock().await;
            Ok(verdicts.pop_front().unwrap_or_else(|| self.last.clone()))
        }
    }

    fn run_config(safety: SafetyConfig) -> RunConfig {
        RunConfig {
            safety,
            review: crate::config::ReviewConfig {
                agents: vec![crate::config::ReviewAgentSpec {
                    name: "reviewer".into(),
                    command: "true".into(),
                    args: vec![],
                    prompt_file: None,
                    focus: vec![],
                    severity_filter: conductor_domain::review::SeverityFilter::All,
                }],
                parallel: true,
            },
            invoker: crate::config::InvokerConfig::default(),
            git: crate::config::GitConfig {
                auto_branch: false,
                auto_commit: true,
            },
            working_dir: PathBuf::from("."),
            completed_plans_dir: None,
        }
    }

    fn make_runner(
        source: Arc<dyn WorkSource>,
        invoker: Arc<dyn AgentInvoker>,
        review_agents: Vec<Arc<dyn ReviewAgent>>,
        config: RunConfig,
    ) -> TaskLoopRunner {
        let review_runner = Arc::new(ReviewRunner::new(review_agents, config.review.clone()));
        TaskLoopRunner::new(
            source,
            Some(Arc::new(NoopMover)),
            invoker,
            review_runner,
            Arc::new(DefaultPromptBuilder),
            Arc::new(FakeGit),
            Arc::new(NoopEventSink),
            config,
        )
    }

    // E1: two-phase plan, clean run, review passes first try.
    #[tokio::test]
    async fn e1_two_phase_plan_clean_run() {
        let fake_source =
            Arc::new(FakeSource::new(vec!["Task one: Setup", "Task two: Implementation"]));
        let source: Arc<dyn WorkSource> = fake_source.clone();
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Ok(status_block(
                Some("Task one: Setup"),
                TaskStatus::Continue,
                vec!["working.txt"],
                "set things up",
            )),
            Ok(status_block(
                Some("Task two: Implementation"),
                TaskStatus::Done,
                vec!["feature.go"],
                "implemented the feature",
            )),
        ]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::always_passes("reviewer"));
        let runner = make_runner(source.clone(), invoker, vec![reviewer], run_config(SafetyConfig::default()));

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Complete);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.total_files_changed, vec!["working.txt", "feature.go"]);
        let item = source.get("w1").await.unwrap();
        assert!(item.phases.iter().all(|p| p.completed));
        assert_eq!(item.status, WorkItemStatus::Closed);
        assert!(
            fake_source
                .notes()
                .iter()
                .any(|n| n.starts_with("Review passed after")),
            "expected a review-passed progress note, got {:?}",
            fake_source.notes()
        );
    }

    // E2: review finds issues once, then passes after a fix iteration.
    #[tokio::test]
    async fn e2_review_finds_issues_then_passes() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec![]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Ok(status_block(None, TaskStatus::Done, vec!["impl.go"], "done")),
            Ok(status_block(
                None,
                TaskStatus::Continue,
                vec!["fix.go"],
                "addressed review feedback",
            )),
        ]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::new(
            "reviewer",
            vec![
                DomainReviewResult {
                    agent_name: "reviewer".into(),
                    issues: vec![
                        Issue {
                            file: "impl.go".into(),
                            line: Some(1),
                            severity: Severity::High,
                            description: "bug one".into(),
                            agent_name: "reviewer".into(),
                        },
                        Issue {
                            file: "impl.go".into(),
                            line: Some(2),
                            severity: Severity::Medium,
                            description: "bug two".into(),
                            agent_name: "reviewer".into(),
                        },
                    ],
                    summary: "found issues".into(),
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
        let runner = make_runner(source, invoker, vec![reviewer], run_config(SafetyConfig::default()));

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Complete);
        assert_eq!(result.iterations, 2);
        assert!(result.total_files_changed.contains(&"fix.go".to_string()));
    }

    // E3: review budget exceeded soft-caps to complete.
    #[tokio::test]
    async fn e3_review_budget_exceeded_soft_caps_complete() {
        let fake_source = Arc::new(FakeSource::new(vec![]));
        let source: Arc<dyn WorkSource> = fake_source.clone();
        let always_issue = || DomainReviewResult {
            agent_name: "reviewer".into(),
            issues: vec![Issue {
                file: "x.go".into(),
                line: None,
                severity: Severity::Low,
                description: "nit".into(),
                agent_name: "reviewer".into(),
            }],
            summary: "still broken".into(),
            error: None,
        };
        let reviewer: Arc<dyn ReviewAgent> =
            Arc::new(ScriptedReviewAgent::new("reviewer", vec![always_issue(), always_issue()]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Ok(status_block(None, TaskStatus::Done, vec!["a.go"], "done")),
            Ok(status_block(None, TaskStatus::Continue, vec!["b.go"], "fix attempt 1")),
        ]));
        let mut config = run_config(SafetyConfig::default());
        config.safety.max_review_iterations = 2;
        let runner = make_runner(source, invoker, vec![reviewer], config);

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Complete);
        assert!(
            fake_source
                .notes()
                .iter()
                .any(|n| n == "Review iteration limit reached"),
            "expected a soft-cap warning note, got {:?}",
            fake_source.notes()
        );
    }

    // E4: stagnation trips when the agent never changes any files.
    #[tokio::test]
    async fn e4_stagnation_trips() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec!["Only phase"]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Ok(status_block(None, TaskStatus::Continue, vec![], "no-op 1")),
            Ok(status_block(None, TaskStatus::Continue, vec![], "no-op 2")),
        ]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::always_passes("reviewer"));
        let mut config = run_config(SafetyConfig::default());
        config.safety.stagnation_limit = 2;
        config.safety.max_iterations = 100;
        let runner = make_runner(source, invoker, vec![reviewer], config);

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        // The safety check at the top of a pass reads the consecutive-no-op
        // count left by the *previous* pass's `record_iteration` (§4.4 steps
        // e vs. i), so with stagnation_limit=2 the exit is detected on the
        // third pass — after two genuinely non-productive invocations — not
        // the second. The iteration counter the runner reports therefore
        // reads 3, mirroring the `max_iterations` boundary's N+1 behaviour.
        assert_eq!(result.exit_reason, ExitReason::Stagnation);
        assert_eq!(result.iterations, 3);
    }

    // E5: BLOCKED surfaces immediately with the reported error.
    #[tokio::test]
    async fn e5_blocked_exits_with_error() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec!["Only phase"]));
        let invoker: Arc<dyn AgentInvoker> =
            Arc::new(ScriptedInvoker::new(vec![Ok(blocked_block("Missing required credentials"))]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::always_passes("reviewer"));
        let runner = make_runner(source, invoker, vec![reviewer], run_config(SafetyConfig::default()));

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Blocked);
        assert_eq!(result.message, "Missing required credentials");
    }

    // E6: three consecutive invoker failures is fatal.
    #[tokio::test]
    async fn e6_invoker_failure_cascade() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec!["Only phase"]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Err("boom 1".into()),
            Err("boom 2".into()),
            Err("boom 3".into()),
        ]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::always_passes("reviewer"));
        let mut config = run_config(SafetyConfig::default());
        config.safety.stagnation_limit = 100;
        let runner = make_runner(source.clone(), invoker, vec![reviewer], config);

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Error);
        assert!(result.message.contains("3 consecutive invocation failures"));
        let item = source.get("w1").await.unwrap();
        assert_ne!(item.status, WorkItemStatus::Closed);
    }

    // Phaseless mode only completes on an explicit DONE report.
    #[tokio::test]
    async fn phaseless_mode_requires_explicit_done() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec![]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![
            Ok(status_block(None, TaskStatus::Continue, vec!["a.go"], "still working")),
            Ok(status_block(None, TaskStatus::Done, vec!["b.go"], "wrapped up")),
        ]));
        let reviewer: Arc<dyn ReviewAgent> = Arc::new(ScriptedReviewAgent::always_passes("reviewer"));
        let runner = make_runner(source, invoker, vec![reviewer], run_config(SafetyConfig::default()));

        let result = runner.run("w1", CancellationToken::new()).await.unwrap();

        assert_eq!(result.exit_reason, ExitReason::Complete);
        assert_eq!(result.iterations, 2);
    }

    // No review agents configured is a fatal misconfiguration, caught before
    // the work item is even touched.
    #[tokio::test]
    async fn no_review_agents_is_fatal_at_start() {
        let source: Arc<dyn WorkSource> = Arc::new(FakeSource::new(vec!["Only phase"]));
        let invoker: Arc<dyn AgentInvoker> = Arc::new(ScriptedInvoker::new(vec![]));
        let mut config = run_config(SafetyConfig::default());
        config.review.agents.clear();
        let runner = make_runner(source, invoker, vec![], config);

        let err = runner.run("w1", CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RunError::NoReviewAgents));
    }
}
