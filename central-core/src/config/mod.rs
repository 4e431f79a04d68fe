//! Runtime configuration types.
//!
//! Built by the server from its configuration file after validation; the
//! rest of the code only ever sees these.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::credentials::DEFAULT_REFRESH_MARGIN;
use crate::processors::DEFAULT_HISTORY_LEN;
use crate::settle::DEFAULT_SETTLE_TIMEOUT;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
}

/// Tunables of the event pipeline itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Quiescence interval of the build failure settle buffer.
    pub settle_timeout: Duration,
    /// Share of a token's lifetime after which it gets refreshed.
    pub token_refresh_margin: f64,
    /// Events kept by the status page, overall and per type.
    pub history_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            token_refresh_margin: DEFAULT_REFRESH_MARGIN,
            history_len: DEFAULT_HISTORY_LEN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubAppConfig {
    pub app_id: String,
    pub private_key_path: PathBuf,
    /// API root, always with a trailing slash.
    pub api_url: Url,
    pub directory_refresh: Duration,
    pub config_check: Duration,
}

#[derive(Clone)]
pub struct BuildbotConfig {
    /// Buildbot root, always with a trailing slash.
    pub url: Url,
    pub change_hook_username: String,
    pub change_hook_password: String,
}

/// Which pull requests get built, and what triggers a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestConfig {
    /// `owner/name` repositories whose pull requests are built.
    pub maintain: Vec<String>,
    /// Phrase a trusted commenter uses to request a build, matched
    /// case-insensitively anywhere in the comment.
    pub rebuild_command: String,
    /// Repository chat `rebuild pr N` commands refer to. Chat rebuilds are
    /// ignored when unset.
    pub command_repo: Option<String>,
    /// Builders that get a pending status when a build is handed off.
    pub builders: Vec<String>,
}

impl PullRequestConfig {
    pub fn is_maintained(&self, repo: &str) -> bool {
        self.maintain.iter().any(|maintained| maintained == repo)
    }
}

impl std::fmt::Debug for BuildbotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildbotConfig")
            .field("url", &self.url)
            .field("change_hook_username", &self.change_hook_username)
            .field("change_hook_password", &"<redacted>")
            .finish()
    }
}
