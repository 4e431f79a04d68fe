pub mod app;
pub mod buildbot;
pub mod pulls;
pub mod status;

pub use app::{Account, AppInfo, Installation, InstallationId, InstallationToken};
pub use buildbot::ChangeHookRequest;
pub use pulls::{PullRequest, PullRequestRef};
pub use status::{CommitState, CreateCommitStatus};
