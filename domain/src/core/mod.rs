//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`] — domain-level errors
//! - [`string`] — small UTF-8-safe string helpers used when rendering
//!   truncated summaries into logs and notes

pub mod error;
pub mod string;
