//! Event type definitions.
//!
//! Every kind of event is a plain payload struct with a stable type tag. The
//! closed [`Event`] enum ties them together. Adding a kind means adding a
//! struct, its variant, its tag and its `From` impl; the dispatcher never
//! changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Implemented by every event payload.
pub trait EventKind: Into<Event> {
    /// Stable type tag, as it appears in the `type` field.
    const TYPE: &'static str;
}

// ---------------------------------------------------------------------------
// Internal events
// ---------------------------------------------------------------------------

/// A log record forwarded into the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalLog {
    pub level: String,
    pub pathname: String,
    pub lineno: u32,
    pub msg: String,
    pub args: String,
}

/// Emitted when the process is asked to reload its configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReload {}

/// Human readable message for chat sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub msg: String,
}

impl Notification {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// A command typed by someone in a chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub who: String,
    pub what: String,
}

/// Issue tracker activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub new: bool,
    pub update: u64,
    pub issue: u64,
    pub title: String,
    pub author: String,
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

/// Unparsed GitHub webhook delivery. `gh_type` is the `X-GitHub-Event` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGhHook {
    pub gh_type: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// One commit of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCommit {
    pub hash: String,
    pub author: CommitAuthor,
    pub message: String,
    pub url: String,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhPush {
    /// `owner/name`
    pub repo: String,
    pub pusher: String,
    pub before_sha: String,
    pub after_sha: String,
    pub commits: Vec<PushCommit>,
    pub base_ref_name: Option<String>,
    pub ref_name: String,
    /// `heads` or `tags`
    pub ref_type: String,
    pub created: bool,
    pub deleted: bool,
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhPullRequest {
    pub repo: String,
    pub author: String,
    pub action: String,
    pub id: u64,
    pub title: String,
    pub base_ref_name: String,
    pub head_ref_name: String,
    pub base_sha: String,
    pub head_sha: String,
    pub url: String,
    /// Whether the author is trusted to have their code built.
    pub safe_author: bool,
    pub merged: bool,
    pub requested_reviewers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub in_reply_to_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhPullRequestReview {
    pub repo: String,
    pub author: String,
    pub action: String,
    pub pr_id: u64,
    pub pr_title: String,
    pub state: String,
    pub url: String,
    pub comments: Vec<ReviewComment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhPullRequestComment {
    pub repo: String,
    pub author: String,
    pub action: String,
    pub id: u64,
    pub hash: String,
    pub url: String,
    pub is_part_of_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GhIssueComment {
    pub repo: String,
    pub author: String,
    pub action: String,
    pub id: u64,
    pub title: String,
    pub url: String,
    pub safe_author: bool,
    pub body: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhCommitComment {
    pub repo: String,
    pub author: String,
    pub commit: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// CI
// ---------------------------------------------------------------------------

/// Result (or progress) of one builder for one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub repo: String,
    pub hash: String,
    pub shortrev: String,
    /// Builder name, used as the commit status context.
    pub service: String,
    pub pr: Option<u64>,
    pub success: bool,
    pub pending: bool,
    pub url: String,
    pub description: String,
}

impl BuildStatus {
    /// Finished and not successful.
    pub fn is_failure(&self) -> bool {
        !self.success && !self.pending
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestFifoCiStatus {
    pub repo: String,
    pub hash: String,
    pub service: String,
    pub pr: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBbHook {
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRedmineHook {
    pub rm_type: String,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDevVersion {
    pub hash: String,
    pub branch: String,
    pub shortrev: String,
    pub author: String,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReleaseVersion {
    pub hash: String,
    pub tag: String,
    pub author: String,
}

// ---------------------------------------------------------------------------
// Event enum
// ---------------------------------------------------------------------------

/// Any event that can travel through the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "internal_log")]
    InternalLog(InternalLog),
    #[serde(rename = "config_reload")]
    ConfigReload(ConfigReload),
    #[serde(rename = "notification")]
    Notification(Notification),
    #[serde(rename = "command_message")]
    CommandMessage(CommandMessage),
    #[serde(rename = "issue")]
    Issue(Issue),
    #[serde(rename = "raw_gh_hook")]
    RawGhHook(RawGhHook),
    #[serde(rename = "gh_push")]
    GhPush(GhPush),
    #[serde(rename = "gh_pull_request")]
    GhPullRequest(GhPullRequest),
    #[serde(rename = "gh_pull_request_review")]
    GhPullRequestReview(GhPullRequestReview),
    #[serde(rename = "gh_pull_request_comment")]
    GhPullRequestComment(GhPullRequestComment),
    #[serde(rename = "gh_issue_comment")]
    GhIssueComment(GhIssueComment),
    #[serde(rename = "gh_commit_comment")]
    GhCommitComment(GhCommitComment),
    #[serde(rename = "build_status")]
    BuildStatus(BuildStatus),
    #[serde(rename = "pull_request_fifoci_status")]
    PullRequestFifoCiStatus(PullRequestFifoCiStatus),
    #[serde(rename = "raw_bb_hook")]
    RawBbHook(RawBbHook),
    #[serde(rename = "raw_redmine_hook")]
    RawRedmineHook(RawRedmineHook),
    #[serde(rename = "new_dev_version")]
    NewDevVersion(NewDevVersion),
    #[serde(rename = "new_release_version")]
    NewReleaseVersion(NewReleaseVersion),
}

impl Event {
    /// Every known type tag, in declaration order.
    pub const TYPES: &'static [&'static str] = &[
        InternalLog::TYPE,
        ConfigReload::TYPE,
        Notification::TYPE,
        CommandMessage::TYPE,
        Issue::TYPE,
        RawGhHook::TYPE,
        GhPush::TYPE,
        GhPullRequest::TYPE,
        GhPullRequestReview::TYPE,
        GhPullRequestComment::TYPE,
        GhIssueComment::TYPE,
        GhCommitComment::TYPE,
        BuildStatus::TYPE,
        PullRequestFifoCiStatus::TYPE,
        RawBbHook::TYPE,
        RawRedmineHook::TYPE,
        NewDevVersion::TYPE,
        NewReleaseVersion::TYPE,
    ];

    /// The stable type tag of this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::InternalLog(_) => InternalLog::TYPE,
            Event::ConfigReload(_) => ConfigReload::TYPE,
            Event::Notification(_) => Notification::TYPE,
            Event::CommandMessage(_) => CommandMessage::TYPE,
            Event::Issue(_) => Issue::TYPE,
            Event::RawGhHook(_) => RawGhHook::TYPE,
            Event::GhPush(_) => GhPush::TYPE,
            Event::GhPullRequest(_) => GhPullRequest::TYPE,
            Event::GhPullRequestReview(_) => GhPullRequestReview::TYPE,
            Event::GhPullRequestComment(_) => GhPullRequestComment::TYPE,
            Event::GhIssueComment(_) => GhIssueComment::TYPE,
            Event::GhCommitComment(_) => GhCommitComment::TYPE,
            Event::BuildStatus(_) => BuildStatus::TYPE,
            Event::PullRequestFifoCiStatus(_) => PullRequestFifoCiStatus::TYPE,
            Event::RawBbHook(_) => RawBbHook::TYPE,
            Event::RawRedmineHook(_) => RawRedmineHook::TYPE,
            Event::NewDevVersion(_) => NewDevVersion::TYPE,
            Event::NewReleaseVersion(_) => NewReleaseVersion::TYPE,
        }
    }
}

// ---------------------------------------------------------------------------
// Type tags and conversions
// ---------------------------------------------------------------------------

impl EventKind for InternalLog {
    const TYPE: &'static str = "internal_log";
}

impl From<InternalLog> for Event {
    fn from(event: InternalLog) -> Self {
        Event::InternalLog(event)
    }
}

impl EventKind for ConfigReload {
    const TYPE: &'static str = "config_reload";
}

impl From<ConfigReload> for Event {
    fn from(event: ConfigReload) -> Self {
        Event::ConfigReload(event)
    }
}

impl EventKind for Notification {
    const TYPE: &'static str = "notification";
}

impl From<Notification> for Event {
    fn from(event: Notification) -> Self {
        Event::Notification(event)
    }
}

impl EventKind for CommandMessage {
    const TYPE: &'static str = "command_message";
}

impl From<CommandMessage> for Event {
    fn from(event: CommandMessage) -> Self {
        Event::CommandMessage(event)
    }
}

impl EventKind for Issue {
    const TYPE: &'static str = "issue";
}

impl From<Issue> for Event {
    fn from(event: Issue) -> Self {
        Event::Issue(event)
    }
}

impl EventKind for RawGhHook {
    const TYPE: &'static str = "raw_gh_hook";
}

impl From<RawGhHook> for Event {
    fn from(event: RawGhHook) -> Self {
        Event::RawGhHook(event)
    }
}

impl EventKind for GhPush {
    const TYPE: &'static str = "gh_push";
}

impl From<GhPush> for Event {
    fn from(event: GhPush) -> Self {
        Event::GhPush(event)
    }
}

impl EventKind for GhPullRequest {
    const TYPE: &'static str = "gh_pull_request";
}

impl From<GhPullRequest> for Event {
    fn from(event: GhPullRequest) -> Self {
        Event::GhPullRequest(event)
    }
}

impl EventKind for GhPullRequestReview {
    const TYPE: &'static str = "gh_pull_request_review";
}

impl From<GhPullRequestReview> for Event {
    fn from(event: GhPullRequestReview) -> Self {
        Event::GhPullRequestReview(event)
    }
}

impl EventKind for GhPullRequestComment {
    const TYPE: &'static str = "gh_pull_request_comment";
}

impl From<GhPullRequestComment> for Event {
    fn from(event: GhPullRequestComment) -> Self {
        Event::GhPullRequestComment(event)
    }
}

impl EventKind for GhIssueComment {
    const TYPE: &'static str = "gh_issue_comment";
}

impl From<GhIssueComment> for Event {
    fn from(event: GhIssueComment) -> Self {
        Event::GhIssueComment(event)
    }
}

impl EventKind for GhCommitComment {
    const TYPE: &'static str = "gh_commit_comment";
}

impl From<GhCommitComment> for Event {
    fn from(event: GhCommitComment) -> Self {
        Event::GhCommitComment(event)
    }
}

impl EventKind for BuildStatus {
    const TYPE: &'static str = "build_status";
}

impl From<BuildStatus> for Event {
    fn from(event: BuildStatus) -> Self {
        Event::BuildStatus(event)
    }
}

impl EventKind for PullRequestFifoCiStatus {
    const TYPE: &'static str = "pull_request_fifoci_status";
}

impl From<PullRequestFifoCiStatus> for Event {
    fn from(event: PullRequestFifoCiStatus) -> Self {
        Event::PullRequestFifoCiStatus(event)
    }
}

impl EventKind for RawBbHook {
    const TYPE: &'static str = "raw_bb_hook";
}

impl From<RawBbHook> for Event {
    fn from(event: RawBbHook) -> Self {
        Event::RawBbHook(event)
    }
}

impl EventKind for RawRedmineHook {
    const TYPE: &'static str = "raw_redmine_hook";
}

impl From<RawRedmineHook> for Event {
    fn from(event: RawRedmineHook) -> Self {
        Event::RawRedmineHook(event)
    }
}

impl EventKind for NewDevVersion {
    const TYPE: &'static str = "new_dev_version";
}

impl From<NewDevVersion> for Event {
    fn from(event: NewDevVersion) -> Self {
        Event::NewDevVersion(event)
    }
}

impl EventKind for NewReleaseVersion {
    const TYPE: &'static str = "new_release_version";
}

impl From<NewReleaseVersion> for Event {
    fn from(event: NewReleaseVersion) -> Self {
        Event::NewReleaseVersion(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_matches_kind() {
        let event: Event = Notification::new("hi").into();
        assert_eq!(event.event_type(), Notification::TYPE);
        assert_eq!(event.event_type(), "notification");

        let event: Event = ConfigReload::default().into();
        assert_eq!(event.event_type(), "config_reload");
    }

    #[test]
    fn test_types_are_unique() {
        let mut types = Event::TYPES.to_vec();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), Event::TYPES.len());
        assert_eq!(types.len(), 18);
    }

    #[test]
    fn test_serialize_tags_with_type_field() {
        let event: Event = NewReleaseVersion {
            hash: "abc".to_string(),
            tag: "5.0".to_string(),
            author: "alice".to_string(),
        }
        .into();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"type": "new_release_version", "hash": "abc", "tag": "5.0", "author": "alice"})
        );
    }

    #[test]
    fn test_config_reload_has_no_fields() {
        let value = serde_json::to_value(Event::from(ConfigReload::default())).unwrap();
        assert_eq!(value, json!({"type": "config_reload"}));
    }

    #[test]
    fn test_build_status_without_pr() {
        let raw = json!({
            "type": "build_status",
            "repo": "dolphin-emu/dolphin",
            "hash": "0123456789abcdef",
            "shortrev": "5.0-1234",
            "service": "lint",
            "pr": null,
            "success": false,
            "pending": false,
            "url": "https://dolphin.ci/#/builders/1/builds/2",
            "description": "lint failed"
        });
        let event: Event = serde_json::from_value(raw).unwrap();
        match event {
            Event::BuildStatus(status) => {
                assert_eq!(status.pr, None);
                assert!(status.is_failure());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_every_tag_is_known_to_serde() {
        for tag in Event::TYPES {
            // Field errors are expected; an unknown variant means the tags drifted.
            if let Err(e) = serde_json::from_value::<Event>(json!({"type": tag})) {
                assert!(!e.to_string().contains("unknown variant"), "{tag}: {e}");
            }
        }
        let reload: Event = serde_json::from_value(json!({"type": "config_reload"})).unwrap();
        assert_eq!(reload.event_type(), ConfigReload::TYPE);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = json!({"type": "gh_fork", "repo": "a/b"});
        assert!(serde_json::from_value::<Event>(raw).is_err());
    }
}
