//! TOML file configuration structures.
//!
//! These structs directly map to the `central.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub github: GitHubConfig,
    /// Build triggering is disabled when this section is absent.
    #[serde(default)]
    pub buildbot: Option<BuildbotConfig>,
    /// Pull request builds; they also need the `[buildbot]` section.
    #[serde(default)]
    pub pull_requests: PullRequestsConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Event pipeline tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Quiet period before failed builds are reported, in seconds.
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Share of a token's lifetime after which it is refreshed.
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin: f64,
    /// Events kept on the status page, overall and per type.
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            settle_secs: default_settle_secs(),
            token_refresh_margin: default_token_refresh_margin(),
            history_len: default_history_len(),
        }
    }
}

fn default_settle_secs() -> u64 {
    30
}

fn default_token_refresh_margin() -> f64 {
    0.8
}

fn default_history_len() -> usize {
    25
}

/// GitHub App section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub app_id: u64,
    /// PEM file downloaded from the app settings page.
    pub private_key_path: PathBuf,
    #[serde(default = "default_api_url")]
    pub api_url: Url,
    /// How often the installation directory is rebuilt, in seconds.
    #[serde(default = "default_refresh_secs")]
    pub directory_refresh_secs: u64,
    /// How often the app configuration is audited, in seconds.
    #[serde(default = "default_refresh_secs")]
    pub config_check_secs: u64,
}

fn default_api_url() -> Url {
    Url::parse(central_sdk::client::GITHUB_API_URL).expect("valid default API URL")
}

fn default_refresh_secs() -> u64 {
    600
}

/// Buildbot change hook section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildbotConfig {
    /// Buildbot root URL, with a trailing slash.
    pub url: Url,
    pub change_hook_username: String,
    pub change_hook_password: String,
}

/// Pull request build section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestsConfig {
    /// `owner/name` repositories whose pull requests get built.
    #[serde(default)]
    pub maintain: Vec<String>,
    /// Comment phrase trusted users use to request a build.
    #[serde(default = "default_rebuild_command")]
    pub rebuild_command: String,
    /// Repository that chat `rebuild pr N` commands refer to.
    #[serde(default)]
    pub command_repo: Option<String>,
    /// Builders that get a pending status on hand-off.
    #[serde(default)]
    pub builders: Vec<String>,
}

impl Default for PullRequestsConfig {
    fn default() -> Self {
        Self {
            maintain: Vec::new(),
            rebuild_command: default_rebuild_command(),
            command_repo: None,
            builders: Vec::new(),
        }
    }
}

fn default_rebuild_command() -> String {
    "@dolphin-emu-bot rebuild".to_string()
}
