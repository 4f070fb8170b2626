//! Domain error types

use thiserror::Error;

/// Domain-level errors: failures that originate in pure decision logic
/// rather than in any adapter.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("no review agents configured")]
    NoReviewAgents,

    #[error("malformed status block: {0}")]
    InvalidStatus(String),

    #[error("invalid severity filter: {0}")]
    InvalidSeverityFilter(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
