//! Configuration module for central-server.
//!
//! Handles loading configuration from the TOML file and CLI overrides,
//! validating it and turning it into runtime configuration.

pub mod file;
pub mod runtime;

use crate::config::file::{
    BuildbotConfig as FileBuildbotConfig, FileConfig, GitHubConfig as FileGitHubConfig,
    PipelineConfig as FilePipelineConfig, PullRequestsConfig as FilePullRequestsConfig,
};
use crate::config::runtime::{
    BuildbotConfig, GitHubAppConfig, PipelineConfig, PullRequestConfig, ServerConfig,
};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub github: GitHubAppConfig,
    pub buildbot: Option<BuildbotConfig>,
    pub pull_requests: PullRequestConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Apply CLI overrides
    /// 3. Validate the configuration
    /// 4. Build the loaded configuration
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn load_str(&self, config_content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;

        Ok(build_loaded_config(file_config))
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let margin = config.pipeline.token_refresh_margin;
    if !(margin > 0.0 && margin <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.token_refresh_margin must be in (0, 1], got {margin}"
        )));
    }
    if config.pipeline.settle_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.settle_secs must not be zero".to_string(),
        ));
    }
    if config.pipeline.history_len == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.history_len must not be zero".to_string(),
        ));
    }
    if config.github.directory_refresh_secs == 0 || config.github.config_check_secs == 0 {
        return Err(ConfigError::ValidationError(
            "github refresh intervals must not be zero".to_string(),
        ));
    }
    if let Some(buildbot) = &config.buildbot {
        if !buildbot.url.path().ends_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "buildbot.url must end with a slash, got {}",
                buildbot.url
            )));
        }
    }
    let pull_requests = &config.pull_requests;
    if pull_requests.rebuild_command.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "pull_requests.rebuild_command must not be empty".to_string(),
        ));
    }
    if let Some(repo) = pull_requests
        .maintain
        .iter()
        .chain(&pull_requests.command_repo)
        .find(|repo| !is_owner_and_name(repo))
    {
        return Err(ConfigError::ValidationError(format!(
            "pull_requests repositories must be owner/name, got {repo:?}"
        )));
    }
    Ok(())
}

fn is_owner_and_name(repo: &str) -> bool {
    match repo.split_once('/') {
        Some((owner, name)) => !owner.is_empty() && !name.is_empty() && !name.contains('/'),
        None => false,
    }
}

fn build_loaded_config(file_config: FileConfig) -> LoadedConfig {
    LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        pipeline: convert_pipeline(file_config.pipeline),
        github: convert_github(file_config.github),
        buildbot: file_config.buildbot.map(convert_buildbot),
        pull_requests: convert_pull_requests(file_config.pull_requests),
    }
}

fn convert_pipeline(p: FilePipelineConfig) -> PipelineConfig {
    PipelineConfig {
        settle_timeout: Duration::from_secs(p.settle_secs),
        token_refresh_margin: p.token_refresh_margin,
        history_len: p.history_len,
    }
}

fn convert_github(g: FileGitHubConfig) -> GitHubAppConfig {
    GitHubAppConfig {
        app_id: g.app_id.to_string(),
        private_key_path: g.private_key_path,
        api_url: with_trailing_slash(g.api_url),
        directory_refresh: Duration::from_secs(g.directory_refresh_secs),
        config_check: Duration::from_secs(g.config_check_secs),
    }
}

fn convert_buildbot(b: FileBuildbotConfig) -> BuildbotConfig {
    BuildbotConfig {
        url: b.url,
        change_hook_username: b.change_hook_username,
        change_hook_password: b.change_hook_password,
    }
}

fn convert_pull_requests(p: FilePullRequestsConfig) -> PullRequestConfig {
    PullRequestConfig {
        maintain: p.maintain,
        rebuild_command: p.rebuild_command.trim().to_string(),
        command_repo: p.command_repo,
        builders: p.builders,
    }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
