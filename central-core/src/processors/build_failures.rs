//! Chat notifications for failed builds.
//!
//! Builders for one revision finish at different times. Failures are fed
//! through a [`SettleBuffer`] so that one message per revision lists every
//! builder that failed, instead of one message per builder.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatch::{DispatcherHandle, EventTarget, TargetError};
use crate::events::{BuildStatus, Envelope, Event, Notification};
use crate::settle::{BatchHandler, SettleBuffer};

/// Source name of the notifications this module dispatches.
pub const NOTIFICATION_SOURCE: &str = "notifications";

pub struct BuildFailureNotifier {
    buffer: SettleBuffer<BuildStatus>,
}

impl BuildFailureNotifier {
    pub fn spawn(
        quiescence: Duration,
        dispatcher: DispatcherHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (buffer, handle) =
            SettleBuffer::spawn(quiescence, FailureReporter { dispatcher }, shutdown_rx);
        (Self { buffer }, handle)
    }
}

fn failed_build(event: &Envelope) -> Option<&BuildStatus> {
    match event.event() {
        Event::BuildStatus(status) if status.is_failure() => Some(status),
        _ => None,
    }
}

impl EventTarget for BuildFailureNotifier {
    fn name(&self) -> &str {
        "build_failure_notifier"
    }

    fn accepts(&self, event: &Envelope) -> bool {
        failed_build(event).is_some()
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        if let Some(status) = failed_build(&event) {
            self.buffer.push(status.clone())?;
        }
        Ok(())
    }
}

/// One message per short revision, in order of first failure.
pub fn summarize(batch: &[BuildStatus]) -> Vec<String> {
    batch
        .iter()
        .map(|status| status.shortrev.as_str())
        .unique()
        .filter_map(|shortrev| {
            let group = batch
                .iter()
                .filter(|status| status.shortrev == shortrev)
                .collect_vec();
            let first = group.first()?;
            let label = match first.pr {
                Some(pr) => format!("#{pr}"),
                None => shortrev.to_string(),
            };
            let builders = group
                .iter()
                .map(|status| status.service.as_str())
                .sorted()
                .join(", ");
            Some(format!(
                "[{}] build for {} failed on builders [{}]: {}",
                first.repo, label, builders, first.url
            ))
        })
        .collect()
}

struct FailureReporter {
    dispatcher: DispatcherHandle,
}

#[async_trait]
impl BatchHandler for FailureReporter {
    type Item = BuildStatus;
    type Error = Infallible;

    fn name(&self) -> &'static str {
        "build_failure_notifier"
    }

    async fn handle_batch(&self, batch: Vec<BuildStatus>) -> Result<(), Infallible> {
        for msg in summarize(&batch) {
            info!(msg = %msg, "Reporting failed build");
            self.dispatcher
                .dispatch(NOTIFICATION_SOURCE, Notification::new(msg));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use tokio::sync::mpsc;

    fn failure(shortrev: &str, service: &str, pr: Option<u64>) -> BuildStatus {
        BuildStatus {
            repo: "dolphin-emu/dolphin".to_string(),
            hash: format!("{shortrev}-hash"),
            shortrev: shortrev.to_string(),
            service: service.to_string(),
            pr,
            success: false,
            pending: false,
            url: format!("https://dolphin.ci/{shortrev}/{service}"),
            description: "failed".to_string(),
        }
    }

    #[test]
    fn test_summarize_groups_by_revision() {
        let batch = vec![
            failure("5.0-2", "windows", None),
            failure("5.0-1", "ubuntu", Some(77)),
            failure("5.0-2", "android", None),
            failure("5.0-1", "macos", Some(77)),
        ];

        assert_eq!(
            summarize(&batch),
            vec![
                "[dolphin-emu/dolphin] build for 5.0-2 failed on builders [android, windows]: https://dolphin.ci/5.0-2/windows".to_string(),
                "[dolphin-emu/dolphin] build for #77 failed on builders [macos, ubuntu]: https://dolphin.ci/5.0-1/ubuntu".to_string(),
            ]
        );
    }

    #[test]
    fn test_only_failures_accepted() {
        let mut ok = failure("5.0-1", "lint", None);
        ok.success = true;
        let mut pending = failure("5.0-1", "lint", None);
        pending.pending = true;

        assert!(failed_build(&Envelope::new("buildbot", failure("5.0-1", "lint", None))).is_some());
        assert!(failed_build(&Envelope::new("buildbot", ok)).is_none());
        assert!(failed_build(&Envelope::new("buildbot", pending)).is_none());
    }

    struct Collector(mpsc::UnboundedSender<Arc<Envelope>>);

    impl EventTarget for Collector {
        fn accepts(&self, event: &Envelope) -> bool {
            matches!(event.event(), Event::Notification(_))
        }

        fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
            let _ = self.0.send(event);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_settle_into_one_notification() {
        let dispatcher = Arc::new(Dispatcher::new());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (notifier, _handle) =
            BuildFailureNotifier::spawn(Duration::from_secs(30), dispatcher.handle(), shutdown_rx);
        let (tx, mut notifications) = mpsc::unbounded_channel();
        dispatcher.register(Arc::new(notifier));
        dispatcher.register(Arc::new(Collector(tx)));

        dispatcher.dispatch("buildbot", failure("5.0-9", "windows", Some(12)));
        tokio::time::sleep(Duration::from_secs(10)).await;
        dispatcher.dispatch("buildbot", failure("5.0-9", "android", Some(12)));

        let event = notifications.recv().await.unwrap();
        assert_eq!(event.source(), NOTIFICATION_SOURCE);
        match event.event() {
            Event::Notification(n) => assert_eq!(
                n.msg,
                "[dolphin-emu/dolphin] build for #12 failed on builders [android, windows]: https://dolphin.ci/5.0-9/windows"
            ),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(notifications.try_recv().is_err());
    }
}
