//! Debounce buffer for bursty events.
//!
//! Items pushed into a [`SettleBuffer`] accumulate until nothing new has
//! arrived for the quiescence interval, then the whole batch goes to the
//! [`BatchHandler`] in arrival order. Every arrival restarts the wait, so a
//! stream that never pauses for that long never flushes. There is no size
//! limit and no cap on the age of the first item.
//!
//! All state lives in one actor task which selects between "new item" and
//! "quiescence timer fired". A batch is handled to completion before the next
//! one starts accumulating; items pushed meanwhile wait in the channel.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::worker::QueueClosed;

/// Quiescence interval used when the configuration does not set one.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Receives settled batches.
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    type Item: Send + 'static;
    type Error: std::error::Error + Send + 'static;

    fn name(&self) -> &'static str;

    async fn handle_batch(&self, batch: Vec<Self::Item>) -> Result<(), Self::Error>;
}

/// Producer side of a settle buffer.
#[derive(Debug)]
pub struct SettleBuffer<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for SettleBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> SettleBuffer<T> {
    /// Start the actor.
    ///
    /// On shutdown a pending batch is dropped. When every producer handle is
    /// gone the pending batch is flushed right away and the actor exits.
    pub fn spawn<H>(
        quiescence: Duration,
        handler: H,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>)
    where
        H: BatchHandler<Item = T>,
    {
        let name = handler.name();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_settler(handler, quiescence, rx, shutdown_rx));
        (Self { name, tx }, handle)
    }

    /// Add an item to the current batch and restart the quiescence wait.
    pub fn push(&self, item: T) -> Result<(), QueueClosed> {
        self.tx
            .send(item)
            .map_err(|_| QueueClosed { name: self.name })
    }
}

fn is_shutdown(changed: Result<(), watch::error::RecvError>, rx: &watch::Receiver<bool>) -> bool {
    changed.is_err() || *rx.borrow()
}

async fn run_settler<H: BatchHandler>(
    handler: H,
    quiescence: Duration,
    mut rx: mpsc::UnboundedReceiver<H::Item>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let name = handler.name();
    info!(buffer = name, quiescence_secs = quiescence.as_secs_f64(), "Settle buffer started");

    'run: loop {
        // Idle until the first item of a batch shows up.
        let first = tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if is_shutdown(changed, &shutdown_rx) {
                    break 'run;
                }
                continue 'run;
            }

            item = rx.recv() => match item {
                Some(item) => item,
                None => break 'run,
            },
        };

        let mut batch = vec![first];
        let mut deadline = Instant::now() + quiescence;
        let mut closed = false;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if is_shutdown(changed, &shutdown_rx) {
                        warn!(buffer = name, dropped = batch.len(), "Dropping unsettled batch on shutdown");
                        break 'run;
                    }
                }

                item = rx.recv() => match item {
                    Some(item) => {
                        batch.push(item);
                        deadline = Instant::now() + quiescence;
                    }
                    None => {
                        closed = true;
                        break;
                    }
                },

                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        debug!(buffer = name, size = batch.len(), "Batch settled");
        match AssertUnwindSafe(handler.handle_batch(batch))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(buffer = name, error = %e, "Failed to handle settled batch"),
            Err(_) => error!(buffer = name, "Batch handler panicked"),
        }

        if closed {
            break;
        }
    }

    info!(buffer = name, "Settle buffer shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct Forward {
        tx: mpsc::UnboundedSender<(Instant, Vec<u32>)>,
    }

    #[async_trait]
    impl BatchHandler for Forward {
        type Item = u32;
        type Error = Infallible;

        fn name(&self) -> &'static str {
            "forward"
        }

        async fn handle_batch(&self, batch: Vec<u32>) -> Result<(), Infallible> {
            let _ = self.tx.send((Instant::now(), batch));
            Ok(())
        }
    }

    fn spawn_forward(
        shutdown_rx: watch::Receiver<bool>,
    ) -> (
        SettleBuffer<u32>,
        JoinHandle<()>,
        mpsc::UnboundedReceiver<(Instant, Vec<u32>)>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (buffer, handle) = SettleBuffer::spawn(DEFAULT_SETTLE_TIMEOUT, Forward { tx }, shutdown_rx);
        (buffer, handle, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_flushes_once_after_quiescence() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, _handle, mut batches) = spawn_forward(shutdown_rx);
        let start = Instant::now();

        buffer.push(1).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        buffer.push(2).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        buffer.push(3).unwrap();

        let (flushed_at, batch) = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1, 2, 3]);
        let elapsed = flushed_at - start;
        assert!(elapsed >= Duration::from_secs(40), "flushed after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(41), "flushed after {elapsed:?}");

        // Nothing else is pending.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(batches.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_stream_never_flushes() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, _handle, mut batches) = spawn_forward(shutdown_rx);

        for i in 0..40 {
            buffer.push(i).unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(batches.try_recv().is_err(), "flushed while stream was active");
        }

        let (_, batch) = batches.recv().await.unwrap();
        assert_eq!(batch, (0..40).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrivals_after_flush_start_new_batch() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, _handle, mut batches) = spawn_forward(shutdown_rx);

        buffer.push(1).unwrap();
        let (_, first) = batches.recv().await.unwrap();
        buffer.push(2).unwrap();
        let (_, second) = batches.recv().await.unwrap();

        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spurious_wakeup_does_not_extend_quiescence() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, _handle, mut batches) = spawn_forward(shutdown_rx);
        let start = Instant::now();

        buffer.push(1).unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        // A change that is not a shutdown request.
        shutdown_tx.send(false).unwrap();

        let (flushed_at, batch) = batches.recv().await.unwrap();
        assert_eq!(batch, vec![1]);
        let elapsed = flushed_at - start;
        assert!(elapsed >= Duration::from_secs(30), "flushed after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(31), "flushed after {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending_batch() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, handle, mut batches) = spawn_forward(shutdown_rx);

        buffer.push(1).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(batches.recv().await.is_none());
        assert!(buffer.push(2).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_flushes_pending_batch() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (buffer, handle, mut batches) = spawn_forward(shutdown_rx);
        let start = Instant::now();

        buffer.push(7).unwrap();
        buffer.push(8).unwrap();
        drop(buffer);
        handle.await.unwrap();

        let (flushed_at, batch) = batches.recv().await.unwrap();
        assert_eq!(batch, vec![7, 8]);
        assert!(flushed_at - start < DEFAULT_SETTLE_TIMEOUT);
    }
}
