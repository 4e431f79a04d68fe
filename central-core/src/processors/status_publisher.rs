//! Mirrors CI results on pull requests as GitHub commit statuses.

use std::sync::Arc;

use async_trait::async_trait;
use central_sdk::client::GitHubClient;
use central_sdk::objects::{CommitState, CreateCommitStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::credentials::{CredentialCache, CredentialError, Scope, TokenIssuer};
use crate::dispatch::{EventTarget, TargetError};
use crate::events::{BuildStatus, Envelope, Event};
use crate::worker::{QueueWorker, WorkerQueue};

/// Accepts `build_status` events that belong to a pull request and posts them
/// to `POST /repos/{repo}/statuses/{sha}` with the repository owner's
/// installation token.
pub struct CommitStatusPublisher {
    queue: WorkerQueue<BuildStatus>,
}

impl CommitStatusPublisher {
    pub fn spawn<I: TokenIssuer>(
        credentials: Arc<CredentialCache<I>>,
        client: GitHubClient,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (queue, handle) = WorkerQueue::spawn(
            StatusWorker {
                credentials,
                client,
            },
            shutdown_rx,
        );
        (Self { queue }, handle)
    }
}

fn pull_request_build(event: &Envelope) -> Option<&BuildStatus> {
    match event.event() {
        Event::BuildStatus(status) if status.pr.is_some() => Some(status),
        _ => None,
    }
}

impl EventTarget for CommitStatusPublisher {
    fn name(&self) -> &str {
        "commit_status_publisher"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        pull_request_build(event).is_some()
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        if let Some(status) = pull_request_build(&event) {
            self.queue.enqueue(status.clone())?;
        }
        Ok(())
    }
}

/// The commit status GitHub should show for `status`.
pub fn commit_status_for(status: &BuildStatus) -> CreateCommitStatus {
    CreateCommitStatus {
        state: CommitState::from_build(status.pending, status.success),
        target_url: status.url.clone(),
        description: status.description.clone(),
        context: status.service.clone(),
    }
}

struct StatusWorker<I> {
    credentials: Arc<CredentialCache<I>>,
    client: GitHubClient,
}

#[async_trait]
impl<I: TokenIssuer> QueueWorker for StatusWorker<I> {
    type Item = BuildStatus;
    type Error = CredentialError;

    fn name(&self) -> &'static str {
        "commit_status_publisher"
    }

    async fn process(&self, status: BuildStatus) -> Result<(), CredentialError> {
        let body = commit_status_for(&status);
        let client = &self.client;
        let (repo, hash, body) = (status.repo.as_str(), status.hash.as_str(), &body);

        self.credentials
            .with_scope_token(&Scope::for_repo(repo), |token| async move {
                client
                    .create_commit_status(token.expose(), repo, hash, body)
                    .await
            })
            .await?;

        debug!(
            repo = %status.repo,
            hash = %status.hash,
            context = %status.service,
            state = %body.state,
            "Published commit status"
        );
        Ok(())
    }
}
