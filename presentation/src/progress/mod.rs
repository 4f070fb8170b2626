//! Interactive spinner-based progress reporting, used instead of the plain
//! [`crate::output::ConsoleEventSink`] when running attached to a terminal.

pub mod reporter;

pub use reporter::ProgressReporter;
