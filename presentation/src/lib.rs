//! Presentation layer for conductor.
//!
//! CLI argument definitions, the console `EventSink` implementations
//! (plain and spinner-backed), and the final-result formatter. Depends on
//! the domain and application layers only — no infrastructure adapter
//! knowledge lives here.

pub mod cli;
pub mod output;
pub mod progress;

pub use cli::{Cli, Command};
pub use output::{CompositeEventSink, ConsoleEventSink, ResultFormatter};
pub use progress::ProgressReporter;
