//! Commit status objects (`POST /repos/{owner}/{repo}/statuses/{sha}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
}

impl CommitState {
    /// Map a CI result onto a commit state. Pending wins over success.
    pub fn from_build(pending: bool, success: bool) -> Self {
        if pending {
            CommitState::Pending
        } else if success {
            CommitState::Success
        } else {
            CommitState::Failure
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitState::Pending => write!(f, "pending"),
            CommitState::Success => write!(f, "success"),
            CommitState::Failure => write!(f, "failure"),
        }
    }
}

/// Request body for creating a commit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommitStatus {
    pub state: CommitState,
    pub target_url: String,
    pub description: String,
    /// The CI service (builder) name.
    pub context: String,
}
