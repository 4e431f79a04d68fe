use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Run `task` right away and then every `period` until shutdown.
///
/// A run that fails or panics is logged; the schedule continues. Runs never
/// overlap: a slow run delays the next tick instead of bunching them up.
pub fn spawn_periodic_task<F, Fut, E>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display,
{
    tokio::spawn(async move {
        info!(task = name, period_secs = period.as_secs(), "Periodic task scheduled");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(task = name, "Periodic task received shutdown signal");
                        break;
                    }
                }

                _ = interval.tick() => {
                    debug!(task = name, "Running periodic task");
                    match AssertUnwindSafe(task()).catch_unwind().await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!(task = name, error = %e, "Periodic task failed"),
                        Err(_) => error!(task = name, "Periodic task panicked"),
                    }
                }
            }
        }
    })
}
