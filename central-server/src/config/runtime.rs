//! Runtime configuration re-exports.
//!
//! The types are defined in `central_core::config` so the pipeline can take
//! them directly.

pub use central_core::config::{
    BuildbotConfig, GitHubAppConfig, PipelineConfig, PullRequestConfig, ServerConfig,
};
