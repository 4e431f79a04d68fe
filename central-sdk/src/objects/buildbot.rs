//! Buildbot change hook requests.
//!
//! The change hook takes its parameters from the query string; build
//! properties travel as a single JSON-encoded string.

use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeHookRequest {
    pub branch: String,
    pub who: String,
    pub revision: String,
    pub comments: String,
    /// JSON object, already encoded.
    pub properties: String,
}

impl ChangeHookRequest {
    /// Build request for the head of pull request `pr_id`.
    pub fn pr_build(
        repo: &str,
        pr_id: u64,
        baserev: &str,
        headrev: &str,
        who: &str,
        comment: &str,
    ) -> Self {
        let shortrev: String = headrev.chars().take(6).collect();
        let properties = json!({
            "branchname": format!("pr-{pr_id}"),
            "baserev": baserev,
            "headrev": headrev,
            "shortrev": shortrev,
            "pr_id": pr_id,
            "repo": repo,
        });
        Self {
            branch: format!("refs/pull/{pr_id}/head"),
            who: who.to_string(),
            revision: headrev.to_string(),
            comments: comment.to_string(),
            properties: properties.to_string(),
        }
    }

    /// Build request for a new development version on `branch`.
    pub fn dev_build(branch: &str, revision: &str, shortrev: &str, who: &str, comment: &str) -> Self {
        let properties = json!({
            "branchname": branch,
            "shortrev": shortrev,
            "author": who,
            "description": comment,
        });
        Self {
            branch: branch.to_string(),
            who: who.to_string(),
            revision: revision.to_string(),
            comments: comment.to_string(),
            properties: properties.to_string(),
        }
    }

    /// Build request for a tagged release.
    pub fn release_build(tag: &str, revision: &str, who: &str) -> Self {
        let comment = format!("Release {tag}");
        let properties = json!({
            "branchname": "releases",
            "shortrev": tag,
            "author": who,
            "description": comment,
        });
        Self {
            branch: format!("refs/tags/{tag}"),
            who: who.to_string(),
            revision: revision.to_string(),
            comments: comment,
            properties: properties.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_build_request() {
        let req = ChangeHookRequest::dev_build("master", "abcdef123456", "5.0-100", "alice", "Fix");
        assert_eq!(req.branch, "master");
        assert_eq!(req.revision, "abcdef123456");
        let props: serde_json::Value = serde_json::from_str(&req.properties).unwrap();
        assert_eq!(props["branchname"], "master");
        assert_eq!(props["shortrev"], "5.0-100");
        assert_eq!(props["author"], "alice");
        assert_eq!(props["description"], "Fix");
    }

    #[test]
    fn test_pr_build_request() {
        let req = ChangeHookRequest::pr_build(
            "dolphin-emu/dolphin",
            12345,
            "aaaaaaaaaaaa",
            "bbbbbbbbbbbb",
            "Central (on behalf of: alice)",
            "Auto build for PR #12345 (bbbbbbbbbbbb).",
        );
        assert_eq!(req.branch, "refs/pull/12345/head");
        assert_eq!(req.revision, "bbbbbbbbbbbb");
        assert_eq!(req.who, "Central (on behalf of: alice)");
        let props: serde_json::Value = serde_json::from_str(&req.properties).unwrap();
        assert_eq!(props["branchname"], "pr-12345");
        assert_eq!(props["baserev"], "aaaaaaaaaaaa");
        assert_eq!(props["headrev"], "bbbbbbbbbbbb");
        assert_eq!(props["shortrev"], "bbbbbb");
        assert_eq!(props["pr_id"], 12345);
        assert_eq!(props["repo"], "dolphin-emu/dolphin");
    }

    #[test]
    fn test_release_build_request() {
        let req = ChangeHookRequest::release_build("5.0", "abcdef", "bob");
        assert_eq!(req.branch, "refs/tags/5.0");
        assert_eq!(req.comments, "Release 5.0");
        let props: serde_json::Value = serde_json::from_str(&req.properties).unwrap();
        assert_eq!(props["branchname"], "releases");
        assert_eq!(props["shortrev"], "5.0");
    }
}
