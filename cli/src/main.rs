//! CLI entrypoint for conductor.
//!
//! Wires the infrastructure adapters into the application layer's use cases
//! and runs one of them to completion, following the teacher's layered
//! dependency-injection style: parse args, build adapters, construct a use
//! case, run it, format the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use conductor_application::ports::prompt_builder::DefaultPromptBuilder;
use conductor_application::ports::{EventSink, Mover, ReviewAgent, WorkSource};
use conductor_application::{ReviewOnlyRunner, ReviewRunner, RunConfig, TaskLoopRunner};
use conductor_domain::safety::ExitReason;
use conductor_infrastructure::{
    ConfigLoader, FileConfig, Git2GitHelper, JsonlProgressLog, PlanFileSource,
    SubprocessAgentInvoker, SubprocessReviewAgent, TicketCliSource,
};
use conductor_presentation::{
    Cli, Command, CompositeEventSink, ConsoleEventSink, ProgressReporter, ResultFormatter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(EnvFilter::new(level));

    let log_dir = cli
        .working_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conductor")
        .join("logs");
    let file_appender = tracing_appender::rolling::daily(&log_dir, "conductor.log");
    let (non_blocking, _log_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if matches!(cli.command, Command::ConfigShow) {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    let file_config: FileConfig =
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    for issue in file_config.validate() {
        warn!("config issue in {}: {}", issue.field, issue.message);
    }

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("could not determine current directory")?,
    };

    let mut run_config = RunConfig {
        safety: file_config.to_safety_config(),
        review: file_config.to_review_config(),
        invoker: file_config.to_invoker_config(),
        git: file_config.to_git_config(),
        completed_plans_dir: file_config.completed_plans_dir.clone(),
        ..RunConfig::default()
    }
    .with_working_dir(working_dir);

    let review_agents: Vec<Arc<dyn ReviewAgent>> = run_config
        .review
        .agents
        .iter()
        .map(|spec| {
            let agent = SubprocessReviewAgent::new(
                spec.name.clone(),
                spec.command.clone(),
                spec.args.clone(),
            )
            .with_prompt_file(spec.prompt_file.clone())
            .with_focus(spec.focus.clone());
            Arc::new(agent) as Arc<dyn ReviewAgent>
        })
        .collect();
    let review_runner = Arc::new(ReviewRunner::new(review_agents, run_config.review.clone()));

    let invoker_args = {
        let mut args = run_config.invoker.args.clone();
        args.extend(run_config.invoker.extra_flags.clone());
        args
    };
    let invoker = Arc::new(SubprocessAgentInvoker::new(
        run_config.invoker.command.clone(),
        invoker_args,
    ));
    let git = Arc::new(Git2GitHelper::new());
    let prompt_builder = Arc::new(DefaultPromptBuilder);

    let events = build_event_sink(&cli);
    let cancel = CancellationToken::new();
    let interrupt_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_cancel.cancel();
        }
    });

    match cli.command {
        Command::ConfigShow => unreachable!("handled above"),
        Command::Run {
            plan,
            ticket,
            no_auto_branch,
            no_auto_commit,
        } => {
            if no_auto_branch {
                run_config.git.auto_branch = false;
            }
            if no_auto_commit {
                run_config.git.auto_commit = false;
            }

            let (work_item_id, source, mover): (String, Arc<dyn WorkSource>, Option<Arc<dyn Mover>>) =
                match (plan, ticket) {
                    (Some(path), None) => {
                        let id = work_item_id_from_path(&path);
                        let plan_source = Arc::new(PlanFileSource::new(path));
                        (id, plan_source.clone(), Some(plan_source))
                    }
                    (None, Some(id)) => {
                        let ticket_source = Arc::new(TicketCliSource::new(file_config.ticket_command()));
                        (id, ticket_source, None)
                    }
                    (None, None) => bail!("run requires either --plan <path> or --ticket <id>"),
                    (Some(_), Some(_)) => unreachable!("clap enforces conflicts_with"),
                };

            let runner = TaskLoopRunner::new(
                source,
                mover,
                invoker,
                review_runner,
                prompt_builder,
                git,
                events,
                run_config,
            );
            let result = runner.run(&work_item_id, cancel).await?;
            println!("{}", ResultFormatter::format_loop_result(&result));
            if !matches!(result.exit_reason, ExitReason::Complete) {
                std::process::exit(1);
            }
        }
        Command::ReviewOnly { base_branch } => {
            let files_changed = git.changed_files(&run_config.working_dir).unwrap_or_default();
            let runner = ReviewOnlyRunner::new(invoker, review_runner, prompt_builder, git, events, run_config);
            let result = runner.run(&base_branch, files_changed, cancel).await?;
            println!("{}", ResultFormatter::format_review_only_result(&result));
            if !result.passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Interactive runs get a spinner; `--quiet` and piped/CI runs get the plain
/// line-oriented console sink. Either way, a JSONL progress log is attached
/// alongside it whenever one can be opened.
fn build_event_sink(cli: &Cli) -> Arc<dyn EventSink> {
    let interactive: Arc<dyn EventSink> = if cli.quiet {
        Arc::new(ConsoleEventSink::new(true))
    } else {
        Arc::new(ProgressReporter::new())
    };

    let log_path = progress_log_path(cli);
    match JsonlProgressLog::new(&log_path) {
        Some(log) => Arc::new(CompositeEventSink::new(vec![interactive, Arc::new(log)])),
        None => interactive,
    }
}

fn progress_log_path(cli: &Cli) -> PathBuf {
    cli.working_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conductor")
        .join("progress.jsonl")
}

fn work_item_id_from_path(path: &std::path::Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
