//! Event model for the distribution pipeline.
//!
//! Producers build one of the payload structs in [`types`], wrap it into an
//! [`Event`] and hand it to the dispatcher together with a source name. The
//! dispatcher stamps the source onto an [`Envelope`], which is what every
//! subscriber receives.
//!
//! # Wire shape
//!
//! An envelope serializes to a flat JSON object: the `type` tag, the `source`
//! and the payload's own fields, nothing else.
//!
//! ```json
//! {"type": "notification", "source": "notifications", "msg": "build failed"}
//! ```

pub mod envelope;
pub mod types;

pub use envelope::Envelope;
pub use types::{
    BuildStatus, CommandMessage, CommitAuthor, ConfigReload, Event, EventKind, GhCommitComment,
    GhIssueComment, GhPullRequest, GhPullRequestComment, GhPullRequestReview, GhPush,
    InternalLog, Issue, NewDevVersion, NewReleaseVersion, Notification,
    PullRequestFifoCiStatus, PushCommit, RawBbHook, RawGhHook, RawRedmineHook, ReviewComment,
};
