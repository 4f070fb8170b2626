//! Logging infrastructure — structured, append-only progress logging.
//!
//! Provides [`JsonlProgressLog`], a JSONL file writer implementing the
//! [`EventSink`](conductor_application::ports::event_sink::EventSink) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlProgressLog;
