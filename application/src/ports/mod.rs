//! Port definitions (interfaces for external adapters).
//!
//! Ports define the contracts infrastructure adapters must implement. The
//! use cases in this crate depend only on these traits, never on a concrete
//! adapter.

pub mod agent_invoker;
pub mod event_sink;
pub mod git_helper;
pub mod prompt_builder;
pub mod review_agent;
pub mod work_source;

pub use agent_invoker::{AgentInvoker, InvocationTelemetry, InvokeOptions, InvokeOutput, InvokerError};
pub use event_sink::{EventSink, LoopEvent};
pub use git_helper::{GitError, GitHelper};
pub use prompt_builder::PromptBuilder;
pub use review_agent::{ReviewAgent, ReviewAgentError};
pub use work_source::{Mover, SourceError, WorkSource};
