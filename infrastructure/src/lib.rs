//! Infrastructure layer for conductor.
//!
//! Adapters that implement the application layer's ports: subprocess-backed
//! agent and review-agent invocation, plan-file and ticket work sources, a
//! libgit2/shell-hybrid git helper, JSONL progress logging, and layered
//! TOML+env configuration loading.

pub mod config;
pub mod git;
pub mod invoker;
pub mod logging;
pub mod review_agent;
pub mod sources;

pub use config::{ConfigLoader, FileConfig};
pub use git::Git2GitHelper;
pub use invoker::SubprocessAgentInvoker;
pub use logging::JsonlProgressLog;
pub use review_agent::SubprocessReviewAgent;
pub use sources::{PlanFileSource, TicketCliSource};
