//! Short-lived bearer credentials for outbound API calls.
//!
//! Tokens are keyed by [`Scope`]: the app itself (its signed JWT) or one
//! organisation installation. The [`CredentialCache`] hands out a cached
//! token while it is fresh and refreshes it through a [`TokenIssuer`]
//! otherwise, at most once at a time per scope.

mod cache;
mod directory;

pub use cache::{CredentialCache, DEFAULT_REFRESH_MARGIN};
pub use directory::ScopeDirectory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use central_sdk::client::ClientError;
use central_sdk::jwt::JwtError;
use central_sdk::objects::InstallationId;
use thiserror::Error;

/// What a token grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The app acting as itself. Displayed as `self`.
    App,
    /// An organisation the app is installed on, by login.
    Organization(String),
}

impl Scope {
    pub fn organization(login: impl Into<String>) -> Self {
        Scope::Organization(login.into())
    }

    /// Scope of the organisation owning `owner/name`.
    pub fn for_repo(repo: &str) -> Self {
        let owner = repo.split_once('/').map_or(repo, |(owner, _)| owner);
        Scope::Organization(owner.to_string())
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::App => write!(f, "self"),
            Scope::Organization(org) => write!(f, "{org}"),
        }
    }
}

/// An opaque bearer secret. `Debug` does not print it.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(Arc<str>);

impl Token {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// A freshly issued token and how long the issuer says it is good for.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: Token,
    pub lifetime: Duration,
}

/// Errors surfaced by the credential cache.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The app has no installation for this organisation, even after a
    /// directory rebuild.
    #[error("app is not installed for organization {0}")]
    NotInstalled(String),

    #[error("api error: {0}")]
    Api(#[from] ClientError),

    #[error("signing error: {0}")]
    Signing(#[from] JwtError),

    #[error("token issuance failed: {0}")]
    Issuance(String),
}

/// Source of fresh tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync + 'static {
    /// Mint the app's own token.
    async fn issue_app_token(&self) -> Result<IssuedToken, CredentialError>;

    /// Organisation login to installation id, for every organisation install.
    async fn list_installations(
        &self,
        app_token: &Token,
    ) -> Result<HashMap<String, InstallationId>, CredentialError>;

    async fn issue_installation_token(
        &self,
        app_token: &Token,
        installation: InstallationId,
    ) -> Result<IssuedToken, CredentialError>;
}
