//! CLI command definitions for the `conductor` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version)]
#[command(about = "Drives a work item through a bounded coding-agent loop, then through a multi-agent review-fix cycle")]
#[command(long_about = r#"
conductor orchestrates an external coding-agent subprocess through a bounded,
self-terminating loop that drives a work item (a markdown plan file with
checkbox tasks, or an externally tracked ticket) to completion, then through
a parallel code-review/fix cycle until the review passes or its iteration
budget is exhausted.

Examples:
  conductor run --plan plans/add-widgets.md
  conductor run --ticket PROJ-123
  conductor review-only --base-branch main
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file (overrides project/global config)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Working directory (repo root); defaults to the current directory
    #[arg(long, global = true, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress bars; only print final results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive a plan file or ticket to completion, then to a passing review.
    Run {
        /// Path to a markdown plan file
        #[arg(long, value_name = "PATH", conflicts_with = "ticket")]
        plan: Option<PathBuf>,

        /// Ticket identifier, read through the configured ticket CLI
        #[arg(long, value_name = "ID", conflicts_with = "plan")]
        ticket: Option<String>,

        /// Disable automatic branch creation/checkout for this run
        #[arg(long)]
        no_auto_branch: bool,

        /// Disable automatic commits on phase completion for this run
        #[arg(long)]
        no_auto_commit: bool,
    },
    /// Skip task phases entirely: loop review -> agent-fix -> review until a
    /// clean review or the review-iteration budget is exhausted.
    ReviewOnly {
        /// Base branch the changes are reviewed against (informational; used
        /// to render the fix prompt)
        #[arg(long, default_value = "HEAD")]
        base_branch: String,
    },
    /// Print which configuration files would be loaded, and from where.
    ConfigShow,
}
