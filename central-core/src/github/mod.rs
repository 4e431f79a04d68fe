//! GitHub App integration: token issuance and configuration audit.

pub mod app;

pub use app::{
    AppConfigProblem, CreateInstallationToken, GetAppInfo, GitHubApp, ListInstallations,
    audit_app_configuration, audit_app_info,
};
