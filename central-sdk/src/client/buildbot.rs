//! Buildbot change hook client.

use reqwest::Client;
use url::Url;

use super::{ClientError, check_status};
use crate::objects::ChangeHookRequest;

/// Client for Buildbot's `change_hook` endpoint, authenticated with HTTP basic auth.
#[derive(Clone)]
pub struct BuildbotClient {
    http: Client,
    change_hook_url: Url,
    username: String,
    password: String,
}

impl BuildbotClient {
    /// Create a new `BuildbotClient`.
    ///
    /// * `base_url` – Buildbot root URL, with a trailing slash.
    pub fn new(
        base_url: &Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            change_hook_url: base_url.join("change_hook")?,
            username: username.into().trim().to_string(),
            password: password.into().trim().to_string(),
        })
    }

    /// Submit a change, which schedules the matching builds.
    pub async fn send_change(&self, request: &ChangeHookRequest) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.change_hook_url.clone())
            .query(request)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        check_status(resp).await?;
        Ok(())
    }
}

impl std::fmt::Debug for BuildbotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildbotClient")
            .field("change_hook_url", &self.change_hook_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
