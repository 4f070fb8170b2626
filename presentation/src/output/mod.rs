//! Output rendering: the live `EventSink` console writer plus the final
//! summary formatter printed once a run terminates.

pub mod composite;
pub mod console;
pub mod formatter;

pub use composite::CompositeEventSink;
pub use console::ConsoleEventSink;
pub use formatter::ResultFormatter;
