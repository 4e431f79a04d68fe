//! GitHub REST API client.
//!
//! Every call takes the bearer token explicitly: app-level endpoints want the
//! app JWT, repository endpoints want an installation token. Token caching is
//! the caller's business.

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use url::Url;

use super::{ClientError, check_status, parse_response};
use crate::objects::{
    AppInfo, CreateCommitStatus, Installation, InstallationId, InstallationToken, PullRequest,
};

/// Default API root.
pub const GITHUB_API_URL: &str = "https://api.github.com/";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Typed HTTP client for the subset of the GitHub API Central uses.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
}

impl GitHubClient {
    /// Create a new `GitHubClient`.
    ///
    /// * `base_url` – API root, with a trailing slash (e.g. [`GITHUB_API_URL`]).
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::builder()
                .user_agent(concat!("central/", env!("CARGO_PKG_VERSION")))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /app/installations` – every installation of the app.
    pub async fn list_installations(&self, app_jwt: &str) -> Result<Vec<Installation>, ClientError> {
        let url = self.base_url.join("app/installations")?;

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {app_jwt}"))
            .query(&[("per_page", "100")])
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /app/installations/{id}/access_tokens` – mint an installation token.
    pub async fn create_installation_token(
        &self,
        app_jwt: &str,
        installation: InstallationId,
    ) -> Result<InstallationToken, ClientError> {
        let url = self
            .base_url
            .join(&format!("app/installations/{installation}/access_tokens"))?;

        let resp = self
            .http
            .post(url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {app_jwt}"))
            .body("{}")
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `GET /app` – permissions and webhook events of the authenticated app.
    pub async fn get_app(&self, app_jwt: &str) -> Result<AppInfo, ClientError> {
        let url = self.base_url.join("app")?;

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {app_jwt}"))
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `GET /repos/{repo}/pulls/{number}` – a single pull request.
    ///
    /// Only the single-PR endpoint reports mergeability.
    pub async fn get_pull_request(
        &self,
        token: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest, ClientError> {
        let url = self.base_url.join(&format!("repos/{repo}/pulls/{number}"))?;

        let resp = self
            .http
            .get(url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;

        parse_response(resp).await
    }

    /// `POST /repos/{repo}/statuses/{sha}` – publish a commit status.
    ///
    /// `repo` is the `owner/name` pair.
    pub async fn create_commit_status(
        &self,
        token: &str,
        repo: &str,
        sha: &str,
        status: &CreateCommitStatus,
    ) -> Result<(), ClientError> {
        let url = self.base_url.join(&format!("repos/{repo}/statuses/{sha}"))?;

        let resp = self
            .http
            .post(url)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(status)
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }
}
