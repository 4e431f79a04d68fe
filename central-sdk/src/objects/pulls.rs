//! Pull request objects (`GET /repos/{owner}/{repo}/pulls/{number}`).

use serde::{Deserialize, Serialize};

/// One side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

/// The fields of a single pull request Central looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    /// `None` while GitHub is still computing it.
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub mergeable_state: Option<String>,
    pub base: PullRequestRef,
    pub head: PullRequestRef,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_pull_request() {
        let raw = json!({
            "number": 12345,
            "title": "Ignored",
            "mergeable": null,
            "mergeable_state": "unknown",
            "base": {"sha": "aaaa", "ref": "master", "label": "dolphin-emu:master"},
            "head": {"sha": "bbbb", "ref": "feature"}
        });
        let pr: PullRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(pr.number, 12345);
        assert_eq!(pr.mergeable, None);
        assert_eq!(pr.mergeable_state.as_deref(), Some("unknown"));
        assert_eq!(pr.base.ref_name, "master");
        assert_eq!(pr.head.sha, "bbbb");
    }
}
