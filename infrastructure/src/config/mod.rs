//! Configuration loading: a layered TOML + environment figment stack that
//! produces a [`FileConfig`], validated and then converted into the
//! application layer's typed [`conductor_application::RunConfig`].

mod file_config;
mod loader;

pub use file_config::{ConfigIssue, FileConfig, FileReviewAgentConfig};
pub use loader::ConfigLoader;
