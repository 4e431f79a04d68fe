//! Schedules Buildbot builds for new versions.

use std::sync::Arc;

use async_trait::async_trait;
use central_sdk::client::{BuildbotClient, ClientError};
use central_sdk::objects::ChangeHookRequest;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatch::{EventTarget, TargetError};
use crate::events::{Envelope, Event};
use crate::worker::{QueueWorker, WorkerQueue};

pub struct BuildTrigger {
    queue: WorkerQueue<ChangeHookRequest>,
}

impl BuildTrigger {
    pub fn spawn(client: BuildbotClient, shutdown_rx: watch::Receiver<bool>) -> (Self, JoinHandle<()>) {
        let (queue, handle) = WorkerQueue::spawn(ChangeSender { client }, shutdown_rx);
        (Self { queue }, handle)
    }
}

/// The change hook request for a version event, if it is one.
pub fn change_request(event: &Event) -> Option<ChangeHookRequest> {
    match event {
        Event::NewDevVersion(version) => Some(ChangeHookRequest::dev_build(
            &version.branch,
            &version.hash,
            &version.shortrev,
            &version.author,
            &version.message,
        )),
        Event::NewReleaseVersion(version) => Some(ChangeHookRequest::release_build(
            &version.tag,
            &version.hash,
            &version.author,
        )),
        _ => None,
    }
}

impl EventTarget for BuildTrigger {
    fn name(&self) -> &str {
        "build_trigger"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        matches!(
            event.event(),
            Event::NewDevVersion(_) | Event::NewReleaseVersion(_)
        )
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        if let Some(request) = change_request(event.event()) {
            self.queue.enqueue(request)?;
        }
        Ok(())
    }
}

struct ChangeSender {
    client: BuildbotClient,
}

#[async_trait]
impl QueueWorker for ChangeSender {
    type Item = ChangeHookRequest;
    type Error = ClientError;

    fn name(&self) -> &'static str {
        "build_trigger"
    }

    async fn process(&self, request: ChangeHookRequest) -> Result<(), ClientError> {
        self.client.send_change(&request).await?;
        info!(
            branch = %request.branch,
            revision = %request.revision,
            "Requested build"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NewDevVersion, NewReleaseVersion, Notification};

    #[test]
    fn test_dev_version_request() {
        let event = Event::from(NewDevVersion {
            hash: "0123abcd".to_string(),
            branch: "master".to_string(),
            shortrev: "5.0-100".to_string(),
            author: "alice".to_string(),
            message: "Fix the thing".to_string(),
            url: "https://github.com/dolphin-emu/dolphin/commit/0123abcd".to_string(),
        });

        let request = change_request(&event).unwrap();
        assert_eq!(request.branch, "master");
        assert_eq!(request.revision, "0123abcd");
        assert_eq!(request.who, "alice");
        assert_eq!(request.comments, "Fix the thing");
    }

    #[test]
    fn test_release_version_request() {
        let event = Event::from(NewReleaseVersion {
            hash: "fedc".to_string(),
            tag: "5.0".to_string(),
            author: "bob".to_string(),
        });

        let request = change_request(&event).unwrap();
        assert_eq!(request.branch, "refs/tags/5.0");
        assert_eq!(request.comments, "Release 5.0");
    }

    #[test]
    fn test_other_events_ignored() {
        assert!(change_request(&Event::from(Notification::new("hi"))).is_none());
    }
}
