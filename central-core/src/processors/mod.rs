//! Subscribers registered with the dispatcher.
//!
//! - `EventHistory`: keeps recent events for the status page
//! - `CommitStatusPublisher`: `build_status` with a PR -> GitHub commit status
//! - `BuildFailureNotifier`: settles failed `build_status` -> `notification`
//! - `BuildTrigger`: `new_dev_version` / `new_release_version` -> Buildbot
//! - `PullRequestBuilder`: pull requests, rebuild comments and chat commands
//!   -> mergeability check -> Buildbot

pub mod build_failures;
pub mod build_trigger;
pub mod event_history;
pub mod pr_builder;
pub mod status_publisher;

pub use build_failures::BuildFailureNotifier;
pub use build_trigger::BuildTrigger;
pub use event_history::{DEFAULT_HISTORY_LEN, EventHistory, HistoryEntry, HistorySnapshot};
pub use pr_builder::{
    BuildPlan, PR_BUILDER_SOURCE, PrBuildRequest, PullRequestBuilder, plan_build,
    spawn_pull_request_builds,
};
pub use status_publisher::CommitStatusPublisher;
