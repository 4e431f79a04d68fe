//! Per-subscriber worker queues.
//!
//! A subscriber that does slow work (HTTP calls, mostly) does not do it in
//! `handle`. It enqueues the event on its own [`WorkerQueue`] and returns; a
//! background task owned by the queue then feeds the items to a
//! [`QueueWorker`] one at a time, in arrival order.
//!
//! A failing or panicking item is logged and dropped; the loop keeps going.
//! There is no retry at this level, workers that want one do it themselves.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// The queue's background task has stopped, so the item was not accepted.
#[derive(Debug, Clone, Copy, Error)]
#[error("worker queue {name} is closed")]
pub struct QueueClosed {
    pub name: &'static str,
}

/// Processes the items of one [`WorkerQueue`].
#[async_trait]
pub trait QueueWorker: Send + Sync + 'static {
    type Item: Send + 'static;
    type Error: std::error::Error + Send + 'static;

    /// Used in logs and in [`QueueClosed`].
    fn name(&self) -> &'static str;

    async fn process(&self, item: Self::Item) -> Result<(), Self::Error>;
}

/// Producer side of a worker queue. Cheap to clone.
#[derive(Debug)]
pub struct WorkerQueue<T> {
    name: &'static str,
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for WorkerQueue<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> WorkerQueue<T> {
    /// Start the background loop for `worker`.
    ///
    /// The loop ends when `shutdown_rx` flips to `true` (pending items are
    /// dropped) or when every producer handle is gone and the queue drained.
    pub fn spawn<W>(worker: W, shutdown_rx: watch::Receiver<bool>) -> (Self, JoinHandle<()>)
    where
        W: QueueWorker<Item = T>,
    {
        let name = worker.name();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(worker, rx, shutdown_rx));
        (Self { name, tx }, handle)
    }

    /// Append an item. Never blocks.
    pub fn enqueue(&self, item: T) -> Result<(), QueueClosed> {
        self.tx
            .send(item)
            .map_err(|_| QueueClosed { name: self.name })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

async fn run_worker<W: QueueWorker>(
    worker: W,
    mut rx: mpsc::UnboundedReceiver<W::Item>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let name = worker.name();
    info!(worker = name, "Worker started");

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!(worker = name, "Worker received shutdown signal");
                    break;
                }
            }

            item = rx.recv() => {
                let Some(item) = item else {
                    info!(worker = name, "Worker queue closed");
                    break;
                };
                debug!(worker = name, "Processing item");
                match AssertUnwindSafe(worker.process(item)).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(worker = name, error = %e, "Failed to process item");
                    }
                    Err(_) => {
                        error!(worker = name, "Worker panicked while processing item");
                    }
                }
            }
        }
    }

    info!(worker = name, "Worker shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    struct Recorder {
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl QueueWorker for Recorder {
        type Item = &'static str;
        type Error = Boom;

        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn process(&self, item: &'static str) -> Result<(), Boom> {
            // Yield so a concurrent second item would have a chance to interleave.
            tokio::task::yield_now().await;
            if item == "panic" {
                panic!("item asked for it");
            }
            self.seen.lock().unwrap().push(item);
            if item == "fail" {
                return Err(Boom);
            }
            Ok(())
        }
    }

    fn recorder() -> (Recorder, Arc<Mutex<Vec<&'static str>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Recorder { seen: seen.clone() }, seen)
    }

    #[tokio::test]
    async fn test_items_processed_in_order() {
        let (worker, seen) = recorder();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, handle) = WorkerQueue::spawn(worker, shutdown_rx);

        queue.enqueue("a").unwrap();
        queue.enqueue("b").unwrap();
        queue.enqueue("c").unwrap();
        drop(queue);
        handle.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let (worker, seen) = recorder();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, handle) = WorkerQueue::spawn(worker, shutdown_rx);

        for item in ["a", "fail", "panic", "b"] {
            queue.enqueue(item).unwrap();
        }
        drop(queue);
        handle.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "fail", "b"]);
    }

    struct Tagged {
        seen: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    #[async_trait]
    impl QueueWorker for Tagged {
        type Item = (usize, usize);
        type Error = Boom;

        fn name(&self) -> &'static str {
            "tagged"
        }

        async fn process(&self, item: (usize, usize)) -> Result<(), Boom> {
            tokio::task::yield_now().await;
            self.seen.lock().unwrap().push(item);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_share_one_queue() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 50;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, handle) = WorkerQueue::spawn(Tagged { seen: seen.clone() }, shutdown_rx);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for seq in 0..PER_PRODUCER {
                        queue.enqueue((producer, seq)).unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        drop(queue);
        handle.await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
        // Each producer's items come out in the order it enqueued them.
        for producer in 0..PRODUCERS {
            let order: Vec<usize> = seen
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, seq)| *seq)
                .collect();
            assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let (worker, _seen) = recorder();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (queue, handle) = WorkerQueue::spawn(worker, shutdown_rx);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        let err = queue.enqueue("late").unwrap_err();
        assert_eq!(err.name, "recorder");
        assert_eq!(err.to_string(), "worker queue recorder is closed");
    }
}
