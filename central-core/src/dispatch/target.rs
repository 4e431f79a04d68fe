use std::sync::Arc;

use thiserror::Error;

use crate::events::Envelope;
use crate::worker::QueueClosed;

/// Why a subscriber could not take an event.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),

    #[error("event rejected: {0}")]
    Rejected(String),
}

/// A consumer registered with the [`Dispatcher`](super::Dispatcher).
///
/// Both methods run inline on the producer's task, so they must be quick:
/// filter in `accepts`, then hand the event to a queue in `handle`.
pub trait EventTarget: Send + Sync {
    /// Used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn accepts(&self, event: &Envelope) -> bool;

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError>;
}
