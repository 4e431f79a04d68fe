//! Pull request builds.
//!
//! Three listeners feed one [`WorkerQueue`]: opened or updated pull requests
//! on maintained repositories, rebuild comments from trusted users and chat
//! `rebuild pr N` commands. The worker looks each pull request up, publishes
//! the outcome as `build_status` events and hands mergeable ones to Buildbot.

use std::sync::Arc;

use async_trait::async_trait;
use central_sdk::client::{BuildbotClient, ClientError, GitHubClient};
use central_sdk::objects::{ChangeHookRequest, PullRequest};
use regex::Regex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

use crate::config::PullRequestConfig;
use crate::credentials::{CredentialCache, CredentialError, Scope, TokenIssuer};
use crate::dispatch::{DispatcherHandle, EventTarget, TargetError};
use crate::events::{BuildStatus, Envelope, Event};
use crate::worker::{QueueWorker, WorkerQueue};

/// Source of the `build_status` events the builder dispatches.
pub const PR_BUILDER_SOURCE: &str = "prbuilder";

/// Status context for the pre-build checks.
const CHECKS_CONTEXT: &str = "default";

const REBUILD_COMMAND_PATTERN: &str = r"(?i)\brebuild (pr ?)?(?P<pr_id>\d+)\b";

/// A request to build the current head of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrBuildRequest {
    pub on_behalf_of: String,
    /// Whether `on_behalf_of` may have code built.
    pub trusted: bool,
    pub repo: String,
    pub pr_id: u64,
}

#[derive(Debug, Error)]
pub enum PrBuildError {
    #[error("pull request lookup failed: {0}")]
    Lookup(#[from] CredentialError),

    #[error("build request failed: {0}")]
    Buildbot(#[from] ClientError),
}

/// What to report and whether to build, for one looked-up pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub statuses: Vec<BuildStatus>,
    pub change: Option<ChangeHookRequest>,
}

/// Decide the outcome of `request` given the current state of its pull request.
pub fn plan_build(
    request: &PrBuildRequest,
    pr: &PullRequest,
    builders: &[String],
    buildbot_url: &str,
) -> BuildPlan {
    let head_sha = pr.head.sha.as_str();
    let shortrev: String = head_sha.chars().take(6).collect();
    let status = |service: &str, success: bool, pending: bool, url: &str, description: String| {
        BuildStatus {
            repo: request.repo.clone(),
            hash: head_sha.to_string(),
            shortrev: shortrev.clone(),
            service: service.to_string(),
            pr: Some(request.pr_id),
            success,
            pending,
            url: url.to_string(),
            description,
        }
    };
    let rejected = |description: String| BuildPlan {
        statuses: vec![status(CHECKS_CONTEXT, false, false, "", description)],
        change: None,
    };

    if !request.trusted {
        return rejected(format!(
            "PR not built because {} is not auto-trusted.",
            request.on_behalf_of
        ));
    }
    // Unknown mergeability is not a reason to refuse.
    if pr.mergeable == Some(false) {
        return rejected("PR cannot be merged, please rebase.".to_string());
    }

    let mut statuses = vec![status(
        CHECKS_CONTEXT,
        true,
        false,
        "",
        "Very basic checks passed, handed off to Buildbot.".to_string(),
    )];
    statuses.extend(builders.iter().map(|builder| {
        status(builder.as_str(), false, true, buildbot_url, "Auto build pending".to_string())
    }));

    let change = ChangeHookRequest::pr_build(
        &request.repo,
        request.pr_id,
        &pr.base.sha,
        head_sha,
        &format!("Central (on behalf of: {})", request.on_behalf_of),
        &format!("Auto build for PR #{} ({head_sha}).", request.pr_id),
    );

    BuildPlan {
        statuses,
        change: Some(change),
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct PullRequestBuilder<I> {
    credentials: Arc<CredentialCache<I>>,
    github: GitHubClient,
    buildbot: BuildbotClient,
    buildbot_url: Url,
    builders: Vec<String>,
    dispatcher: DispatcherHandle,
}

impl<I: TokenIssuer> PullRequestBuilder<I> {
    pub fn new(
        credentials: Arc<CredentialCache<I>>,
        github: GitHubClient,
        buildbot: BuildbotClient,
        buildbot_url: Url,
        builders: Vec<String>,
        dispatcher: DispatcherHandle,
    ) -> Self {
        Self {
            credentials,
            github,
            buildbot,
            buildbot_url,
            builders,
            dispatcher,
        }
    }

    async fn fetch(&self, request: &PrBuildRequest) -> Result<PullRequest, CredentialError> {
        let github = &self.github;
        self.credentials
            .with_scope_token(&Scope::for_repo(&request.repo), |token| async move {
                github
                    .get_pull_request(token.expose(), &request.repo, request.pr_id)
                    .await
            })
            .await
    }
}

#[async_trait]
impl<I: TokenIssuer> QueueWorker for PullRequestBuilder<I> {
    type Item = PrBuildRequest;
    type Error = PrBuildError;

    fn name(&self) -> &'static str {
        "pr_builder"
    }

    async fn process(&self, request: PrBuildRequest) -> Result<(), PrBuildError> {
        // Only the single pull request endpoint reports mergeability.
        let pr = self.fetch(&request).await?;
        info!(
            repo = %request.repo,
            pr = request.pr_id,
            mergeable = ?pr.mergeable,
            mergeable_state = ?pr.mergeable_state,
            "Checked pull request"
        );

        let plan = plan_build(&request, &pr, &self.builders, self.buildbot_url.as_str());
        for status in plan.statuses {
            self.dispatcher.dispatch(PR_BUILDER_SOURCE, status);
        }

        if let Some(change) = plan.change {
            self.buildbot.send_change(&change).await?;
            info!(
                repo = %request.repo,
                pr = request.pr_id,
                on_behalf_of = %request.on_behalf_of,
                "Requested pull request build"
            );
        }
        Ok(())
    }
}

/// Start `worker` and build the listeners that feed it.
///
/// Every listener holds a producer handle of the same queue, so requests from
/// all of them are processed one at a time in arrival order.
pub fn spawn_pull_request_builds<W>(
    worker: W,
    config: Arc<PullRequestConfig>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<(Vec<Arc<dyn EventTarget>>, JoinHandle<()>), regex::Error>
where
    W: QueueWorker<Item = PrBuildRequest>,
{
    let pattern = Regex::new(REBUILD_COMMAND_PATTERN)?;
    let (queue, handle) = WorkerQueue::spawn(worker, shutdown_rx);
    Ok((pull_request_listeners(queue, config, pattern), handle))
}

fn pull_request_listeners(
    queue: WorkerQueue<PrBuildRequest>,
    config: Arc<PullRequestConfig>,
    pattern: Regex,
) -> Vec<Arc<dyn EventTarget>> {
    let mut listeners: Vec<Arc<dyn EventTarget>> = vec![
        Arc::new(PullRequestListener {
            queue: queue.clone(),
            config: config.clone(),
        }),
        Arc::new(RebuildCommentListener {
            queue: queue.clone(),
            config: config.clone(),
        }),
    ];
    if let Some(repo) = config.command_repo.clone() {
        listeners.push(Arc::new(RebuildCommandListener {
            queue,
            repo,
            pattern,
        }));
    }
    listeners
}

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

/// Builds pull requests when they are opened or pushed to.
struct PullRequestListener {
    queue: WorkerQueue<PrBuildRequest>,
    config: Arc<PullRequestConfig>,
}

impl EventTarget for PullRequestListener {
    fn name(&self) -> &str {
        "pr_builder.pull_requests"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        matches!(event.event(), Event::GhPullRequest(_))
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        let Event::GhPullRequest(pr) = event.event() else {
            return Ok(());
        };
        if !matches!(pr.action.as_str(), "opened" | "synchronize") {
            return Ok(());
        }
        if !self.config.is_maintained(&pr.repo) {
            return Ok(());
        }
        self.queue.enqueue(PrBuildRequest {
            on_behalf_of: pr.author.clone(),
            trusted: pr.safe_author,
            repo: pr.repo.clone(),
            pr_id: pr.id,
        })?;
        Ok(())
    }
}

/// Lets trusted users request a build of someone else's pull request.
struct RebuildCommentListener {
    queue: WorkerQueue<PrBuildRequest>,
    config: Arc<PullRequestConfig>,
}

impl EventTarget for RebuildCommentListener {
    fn name(&self) -> &str {
        "pr_builder.rebuild_comments"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        matches!(event.event(), Event::GhIssueComment(_))
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        let Event::GhIssueComment(comment) = event.event() else {
            return Ok(());
        };
        let command = self.config.rebuild_command.to_lowercase();
        let requested = !command.is_empty() && comment.body.to_lowercase().contains(&command);
        if !comment.safe_author
            || !requested
            || comment.action != "created"
            || !self.config.is_maintained(&comment.repo)
        {
            return Ok(());
        }
        debug!(repo = %comment.repo, pr = comment.id, author = %comment.author, "Rebuild requested in comment");
        // `id` of an issue comment event is the pull request number.
        self.queue.enqueue(PrBuildRequest {
            on_behalf_of: comment.author.clone(),
            trusted: true,
            repo: comment.repo.clone(),
            pr_id: comment.id,
        })?;
        Ok(())
    }
}

/// `rebuild pr N` typed in chat.
struct RebuildCommandListener {
    queue: WorkerQueue<PrBuildRequest>,
    repo: String,
    pattern: Regex,
}

impl RebuildCommandListener {
    fn requested_pr(&self, text: &str) -> Option<u64> {
        self.pattern.captures(text)?.name("pr_id")?.as_str().parse().ok()
    }
}

impl EventTarget for RebuildCommandListener {
    fn name(&self) -> &str {
        "pr_builder.rebuild_commands"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        matches!(event.event(), Event::CommandMessage(_))
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        let Event::CommandMessage(command) = event.event() else {
            return Ok(());
        };
        let Some(pr_id) = self.requested_pr(&command.what) else {
            return Ok(());
        };
        self.queue.enqueue(PrBuildRequest {
            on_behalf_of: command.who.clone(),
            trusted: true,
            repo: self.repo.clone(),
            pr_id,
        })?;
        Ok(())
    }
}
