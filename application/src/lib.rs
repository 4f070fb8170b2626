//! Application layer for conductor.
//!
//! Contains the use cases (task loop runner, review runner, review-fix
//! integration, review-only runner) and the port traits external adapters
//! implement. Depends only on the domain layer plus the async runtime and
//! logging facade.

pub mod config;
pub mod ports;
pub mod use_cases;

pub use config::RunConfig;
pub use use_cases::review_only_runner::{ReviewOnlyResult, ReviewOnlyRunner};
pub use use_cases::review_runner::ReviewRunner;
pub use use_cases::task_loop_runner::{LoopResult, TaskLoopRunner};
