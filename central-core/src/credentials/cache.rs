use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError};

use central_sdk::client::ClientError;
use central_sdk::objects::InstallationId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{CredentialError, IssuedToken, Scope, ScopeDirectory, Token, TokenIssuer};

/// Share of a token's lifetime after which it is considered stale.
pub const DEFAULT_REFRESH_MARGIN: f64 = 0.8;

#[derive(Debug)]
struct CachedToken {
    token: Token,
    expires_at: Instant,
}

type Slot = Arc<Mutex<Option<CachedToken>>>;

/// Thread-safe, lazily refreshed token cache.
///
/// Each scope has its own async lock. The first caller to find a scope stale
/// refreshes it while holding the lock; concurrent callers for that scope
/// wait and then reuse the new token. Unrelated scopes never contend.
pub struct CredentialCache<I> {
    issuer: I,
    margin: f64,
    slots: std::sync::Mutex<HashMap<Scope, Slot>>,
    directory: ScopeDirectory,
}

impl<I: TokenIssuer> CredentialCache<I> {
    pub fn new(issuer: I) -> Self {
        Self {
            issuer,
            margin: DEFAULT_REFRESH_MARGIN,
            slots: std::sync::Mutex::new(HashMap::new()),
            directory: ScopeDirectory::new(),
        }
    }

    /// Override the refresh margin.
    ///
    /// Values above 1 are clamped to 1. Zero, negative and NaN margins fall
    /// back to [`DEFAULT_REFRESH_MARGIN`].
    pub fn with_refresh_margin(mut self, margin: f64) -> Self {
        self.margin = if margin > 0.0 {
            margin.min(1.0)
        } else {
            warn!(margin, "Ignoring invalid token refresh margin");
            DEFAULT_REFRESH_MARGIN
        };
        self
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    pub fn directory(&self) -> &ScopeDirectory {
        &self.directory
    }

    /// A valid token for `scope`, refreshed if absent or stale.
    pub async fn get(&self, scope: &Scope) -> Result<Token, CredentialError> {
        match scope {
            Scope::App => self.app_token().await,
            Scope::Organization(org) => {
                self.get_or_refresh(scope, || async {
                    let installation = self.resolve(org).await?;
                    let app_token = self.app_token().await?;
                    self.issuer
                        .issue_installation_token(&app_token, installation)
                        .await
                })
                .await
            }
        }
    }

    /// Forget the cached token for `scope`.
    pub async fn invalidate(&self, scope: &Scope) {
        let slot = self.slot(scope);
        *slot.lock().await = None;
        debug!(scope = %scope, "Invalidated cached token");
    }

    /// Forget the cached token for `scope` only if it is still `rejected`.
    ///
    /// A caller that saw `rejected` fail must not throw away a token someone
    /// else already refreshed. Returns whether the entry was cleared.
    pub async fn invalidate_if(&self, scope: &Scope, rejected: &Token) -> bool {
        let slot = self.slot(scope);
        let mut cached = slot.lock().await;
        if cached.as_ref().is_some_and(|entry| &entry.token == rejected) {
            *cached = None;
            debug!(scope = %scope, "Invalidated rejected token");
            true
        } else {
            false
        }
    }

    /// Re-list the app's installations and replace the directory.
    ///
    /// Returns the number of organisations found.
    pub async fn rebuild_directory(&self) -> Result<usize, CredentialError> {
        let _guard = self.directory.rebuild_lock.lock().await;
        self.rebuild_locked().await
    }

    /// Installation id for `org`, rebuilding the directory once on a miss.
    pub async fn resolve(&self, org: &str) -> Result<InstallationId, CredentialError> {
        if let Some(id) = self.directory.lookup(org) {
            return Ok(id);
        }

        let seen = self.directory.generation();
        let guard = self.directory.rebuild_lock.lock().await;
        // Someone else rebuilt while we waited.
        if self.directory.generation() == seen {
            self.rebuild_locked().await?;
        }
        drop(guard);

        self.directory
            .lookup(org)
            .ok_or_else(|| CredentialError::NotInstalled(org.to_string()))
    }

    /// Run `call` with a token for `scope`.
    ///
    /// If the server answers 401 the token is invalidated and `call` runs once
    /// more with a fresh one. A second 401 is returned as is.
    pub async fn with_scope_token<T, F, Fut>(
        &self,
        scope: &Scope,
        mut call: F,
    ) -> Result<T, CredentialError>
    where
        F: FnMut(Token) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let token = self.get(scope).await?;
        match call(token.clone()).await {
            Err(e) if e.is_unauthorized() => {
                warn!(scope = %scope, "Token rejected, refreshing and retrying once");
                self.invalidate_if(scope, &token).await;
                let token = self.get(scope).await?;
                Ok(call(token).await?)
            }
            result => Ok(result?),
        }
    }

    async fn app_token(&self) -> Result<Token, CredentialError> {
        self.get_or_refresh(&Scope::App, || self.issuer.issue_app_token())
            .await
    }

    async fn rebuild_locked(&self) -> Result<usize, CredentialError> {
        let app_token = self.app_token().await?;
        let installations = self.issuer.list_installations(&app_token).await?;
        let count = installations.len();
        self.directory.replace(installations);
        info!(organizations = count, "Rebuilt installation directory");
        Ok(count)
    }

    fn slot(&self, scope: &Scope) -> Slot {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(scope.clone())
            .or_default()
            .clone()
    }

    async fn get_or_refresh<F, Fut>(&self, scope: &Scope, refresh: F) -> Result<Token, CredentialError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IssuedToken, CredentialError>>,
    {
        let slot = self.slot(scope);
        let mut cached = slot.lock().await;

        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                return Ok(entry.token.clone());
            }
        }

        *cached = None;
        let issued_at = Instant::now();
        let issued = refresh().await?;
        let valid_for = issued.lifetime.mul_f64(self.margin);
        debug!(
            scope = %scope,
            valid_for_secs = valid_for.as_secs(),
            "Issued new token"
        );
        *cached = Some(CachedToken {
            token: issued.token.clone(),
            expires_at: issued_at + valid_for,
        });
        Ok(issued.token)
    }
}

impl<I> std::fmt::Debug for CredentialCache<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("margin", &self.margin)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
