//! The GitHub App as a [`TokenIssuer`].
//!
//! The app signs its own JWT locally, lists its organisation installations
//! and exchanges the JWT for per-installation tokens. Each API call is a
//! [`Processor`] over a small request struct; the [`TokenIssuer`] impl wires
//! them into the credential cache.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use central_sdk::client::{ClientError, GitHubClient};
use central_sdk::jwt::{APP_TOKEN_LIFETIME_SECS, AppKey, JwtError};
use central_sdk::objects::{AppInfo, InstallationId};
use kanau::processor::Processor;
use tracing::{debug, error, info};

use crate::credentials::{CredentialCache, CredentialError, IssuedToken, Scope, Token, TokenIssuer};

/// Used when GitHub does not say when an installation token expires.
const INSTALLATION_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

const EXPECTED_PERMISSIONS: &[(&str, &str)] = &[
    ("checks", "write"),
    ("contents", "read"),
    ("issues", "write"),
    ("members", "read"),
    ("metadata", "read"),
    ("pull_requests", "write"),
    ("statuses", "write"),
];

const EXPECTED_EVENTS: &[&str] = &[
    "check_run",
    "commit_comment",
    "issue_comment",
    "pull_request",
    "pull_request_review",
    "pull_request_review_comment",
    "push",
];

pub struct GitHubApp {
    app_id: String,
    key: AppKey,
    client: GitHubClient,
}

impl GitHubApp {
    pub fn new(app_id: impl Into<String>, key: AppKey, client: GitHubClient) -> Self {
        Self {
            app_id: app_id.into(),
            key,
            client,
        }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    fn sign_jwt(&self) -> Result<Token, JwtError> {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        self.key.sign(&self.app_id, now).map(Token::new)
    }
}

impl std::fmt::Debug for GitHubApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubApp")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// List organisation installations, keyed by organisation login.
#[derive(Debug, Clone)]
pub struct ListInstallations {
    pub app_token: Token,
}

#[derive(Debug, Clone)]
pub struct CreateInstallationToken {
    pub app_token: Token,
    pub installation: InstallationId,
}

#[derive(Debug, Clone)]
pub struct GetAppInfo {
    pub app_token: Token,
}

impl Processor<ListInstallations> for GitHubApp {
    type Output = HashMap<String, InstallationId>;
    type Error = ClientError;
    #[tracing::instrument(skip_all, err, name = "GitHub:ListInstallations")]
    async fn process(
        &self,
        request: ListInstallations,
    ) -> Result<HashMap<String, InstallationId>, ClientError> {
        let installations = self
            .client
            .list_installations(request.app_token.expose())
            .await?;
        Ok(installations
            .into_iter()
            .filter(|install| install.is_organization())
            .map(|install| (install.account.login, install.id))
            .collect())
    }
}

impl Processor<CreateInstallationToken> for GitHubApp {
    type Output = IssuedToken;
    type Error = ClientError;
    #[tracing::instrument(skip_all, err, name = "GitHub:CreateInstallationToken")]
    async fn process(&self, request: CreateInstallationToken) -> Result<IssuedToken, ClientError> {
        let response = self
            .client
            .create_installation_token(request.app_token.expose(), request.installation)
            .await?;

        let lifetime = response
            .expires_at()
            .map(|expires_at| expires_at - time::OffsetDateTime::now_utc())
            .and_then(|remaining| Duration::try_from(remaining).ok())
            .unwrap_or(INSTALLATION_TOKEN_LIFETIME);

        Ok(IssuedToken {
            token: Token::new(response.token),
            lifetime,
        })
    }
}

impl Processor<GetAppInfo> for GitHubApp {
    type Output = AppInfo;
    type Error = ClientError;
    #[tracing::instrument(skip_all, err, name = "GitHub:GetAppInfo")]
    async fn process(&self, request: GetAppInfo) -> Result<AppInfo, ClientError> {
        self.client.get_app(request.app_token.expose()).await
    }
}

#[async_trait]
impl TokenIssuer for GitHubApp {
    async fn issue_app_token(&self) -> Result<IssuedToken, CredentialError> {
        let token = self.sign_jwt()?;
        Ok(IssuedToken {
            token,
            lifetime: Duration::from_secs(APP_TOKEN_LIFETIME_SECS.unsigned_abs()),
        })
    }

    async fn list_installations(
        &self,
        app_token: &Token,
    ) -> Result<HashMap<String, InstallationId>, CredentialError> {
        let installations = self
            .process(ListInstallations {
                app_token: app_token.clone(),
            })
            .await?;
        debug!(count = installations.len(), "Listed organization installations");
        Ok(installations)
    }

    async fn issue_installation_token(
        &self,
        app_token: &Token,
        installation: InstallationId,
    ) -> Result<IssuedToken, CredentialError> {
        Ok(self
            .process(CreateInstallationToken {
                app_token: app_token.clone(),
                installation,
            })
            .await?)
    }
}

// ---------------------------------------------------------------------------
// Configuration audit
// ---------------------------------------------------------------------------

/// A mismatch between the app's settings on GitHub and what Central needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppConfigProblem {
    MissingPermission {
        permission: &'static str,
        expected: &'static str,
    },
    WrongPermission {
        permission: &'static str,
        expected: &'static str,
        actual: String,
    },
    MissingEvent(&'static str),
}

impl std::fmt::Display for AppConfigProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppConfigProblem::MissingPermission {
                permission,
                expected,
            } => write!(f, "missing permission {permission} (should be {expected})"),
            AppConfigProblem::WrongPermission {
                permission,
                expected,
                actual,
            } => write!(f, "permission {permission} is {actual}, should be {expected}"),
            AppConfigProblem::MissingEvent(event) => {
                write!(f, "missing webhook event subscription {event}")
            }
        }
    }
}

/// Compare the app's permissions and webhook events against the expected set.
pub fn audit_app_info(info: &AppInfo) -> Vec<AppConfigProblem> {
    let mut problems = Vec::new();

    for &(permission, expected) in EXPECTED_PERMISSIONS {
        match info.permissions.get(permission) {
            None => problems.push(AppConfigProblem::MissingPermission {
                permission,
                expected,
            }),
            Some(actual) if actual != expected => {
                problems.push(AppConfigProblem::WrongPermission {
                    permission,
                    expected,
                    actual: actual.clone(),
                })
            }
            Some(_) => {}
        }
    }

    for &event in EXPECTED_EVENTS {
        if !info.events.iter().any(|e| e == event) {
            problems.push(AppConfigProblem::MissingEvent(event));
        }
    }

    problems
}

/// Fetch the app settings through `fetch` with the cached app token and log
/// every configuration problem.
///
/// Returns the number of problems found.
pub async fn audit_app_configuration<I, F, Fut>(
    credentials: &CredentialCache<I>,
    fetch: F,
) -> Result<usize, CredentialError>
where
    I: TokenIssuer,
    F: FnMut(Token) -> Fut,
    Fut: Future<Output = Result<AppInfo, ClientError>>,
{
    let info = credentials.with_scope_token(&Scope::App, fetch).await?;
    let problems = audit_app_info(&info);
    for problem in &problems {
        error!(problem = %problem, "GitHub App misconfigured");
    }
    if problems.is_empty() {
        info!("GitHub App configuration looks good");
    }
    Ok(problems.len())
}

impl CredentialCache<GitHubApp> {
    /// Audit `GET /app` against the permissions and events Central needs.
    pub async fn check_app_configuration(&self) -> Result<usize, CredentialError> {
        let app = self.issuer();
        audit_app_configuration(self, |app_token| app.process(GetAppInfo { app_token })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingIssuer {
        app_issued: AtomicUsize,
    }

    #[async_trait]
    impl TokenIssuer for CountingIssuer {
        async fn issue_app_token(&self) -> Result<IssuedToken, CredentialError> {
            let n = self.app_issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken {
                token: Token::new(format!("jwt-{n}")),
                lifetime: Duration::from_secs(600),
            })
        }

        async fn list_installations(
            &self,
            _app_token: &Token,
        ) -> Result<HashMap<String, InstallationId>, CredentialError> {
            Ok(HashMap::new())
        }

        async fn issue_installation_token(
            &self,
            _app_token: &Token,
            _installation: InstallationId,
        ) -> Result<IssuedToken, CredentialError> {
            Err(CredentialError::Issuance("not used".to_string()))
        }
    }

    fn complete_app_info() -> AppInfo {
        AppInfo {
            permissions: EXPECTED_PERMISSIONS
                .iter()
                .map(|(p, v)| (p.to_string(), v.to_string()))
                .collect(),
            events: EXPECTED_EVENTS.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_audit_reuses_cached_app_token() {
        let credentials = CredentialCache::new(CountingIssuer::default());
        let cached = credentials.get(&Scope::App).await.unwrap();
        let used = Mutex::new(Vec::new());

        let problems = audit_app_configuration(&credentials, |token| {
            used.lock().unwrap().push(token);
            async {
                let mut info = complete_app_info();
                info.events.retain(|e| e != "push");
                Ok::<_, ClientError>(info)
            }
        })
        .await
        .unwrap();

        assert_eq!(problems, 1);
        assert_eq!(*used.lock().unwrap(), vec![cached]);
        assert_eq!(credentials.issuer().app_issued.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_audit_complete_configuration() {
        assert!(audit_app_info(&complete_app_info()).is_empty());
    }

    #[test]
    fn test_audit_reports_every_problem() {
        let mut info = complete_app_info();
        info.permissions.remove("members");
        info.permissions
            .insert("statuses".to_string(), "read".to_string());
        info.events.retain(|e| e != "push");
        // Extra permissions are fine.
        info.permissions
            .insert("actions".to_string(), "read".to_string());

        let problems = audit_app_info(&info);
        assert_eq!(
            problems,
            vec![
                AppConfigProblem::MissingPermission {
                    permission: "members",
                    expected: "read",
                },
                AppConfigProblem::WrongPermission {
                    permission: "statuses",
                    expected: "write",
                    actual: "read".to_string(),
                },
                AppConfigProblem::MissingEvent("push"),
            ]
        );
        assert_eq!(
            problems[1].to_string(),
            "permission statuses is read, should be write"
        );
    }
}
