//! GitHub App API objects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of one installation of the GitHub App.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(pub u64);

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account an installation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// One entry of `GET /app/installations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: InstallationId,
    pub account: Account,
    /// `Organization` or `User`.
    pub target_type: String,
}

impl Installation {
    /// Whether this installation targets an organization account.
    pub fn is_organization(&self) -> bool {
        self.target_type.eq_ignore_ascii_case("organization")
    }
}

/// Response of `POST /app/installations/{id}/access_tokens`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    /// RFC 3339 expiry timestamp, when GitHub provides one.
    #[serde(default)]
    pub expires_at: Option<String>,
}

impl InstallationToken {
    /// Parse `expires_at` into a timestamp.
    pub fn expires_at(&self) -> Option<time::OffsetDateTime> {
        let raw = self.expires_at.as_deref()?;
        time::OffsetDateTime::parse(raw, &time::format_description::well_known::Rfc3339).ok()
    }
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Subset of `GET /app` used for the configuration audit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppInfo {
    #[serde(default)]
    pub permissions: HashMap<String, String>,
    #[serde(default)]
    pub events: Vec<String>,
}
