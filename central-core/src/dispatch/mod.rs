//! Broadcast dispatcher.
//!
//! The [`Dispatcher`] owns the list of subscribers and hands every event to
//! each interested one, in registration order. A subscriber that fails,
//! by returning an error or by panicking, is logged and skipped; it never
//! prevents delivery to the others and never reaches the producer.

mod target;

pub use target::{EventTarget, TargetError};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, error};

use crate::events::{Envelope, Event};

#[derive(Default)]
pub struct Dispatcher {
    targets: RwLock<Vec<Arc<dyn EventTarget>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber. Subscribers live as long as the dispatcher.
    pub fn register(&self, target: Arc<dyn EventTarget>) {
        debug!(target = target.name(), "Registering event target");
        self.targets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target);
    }

    pub fn target_count(&self) -> usize {
        self.targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// A weak handle for subscribers that dispatch events of their own.
    pub fn handle(self: &Arc<Self>) -> DispatcherHandle {
        DispatcherHandle(Arc::downgrade(self))
    }

    /// Deliver `event` from `source` to every subscriber that accepts it.
    ///
    /// Returns once every subscriber has been offered the event. Work the
    /// subscribers queue up is not awaited.
    pub fn dispatch(&self, source: &str, event: impl Into<Event>) {
        let envelope = Arc::new(Envelope::new(source, event));
        let targets = self
            .targets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        debug!(
            source = %source,
            event_type = envelope.event_type(),
            "Dispatching event"
        );

        for target in targets {
            let accepted = match catch_unwind(AssertUnwindSafe(|| target.accepts(&envelope))) {
                Ok(accepted) => accepted,
                Err(_) => {
                    error!(
                        target = target.name(),
                        event_type = envelope.event_type(),
                        "Event target panicked in accepts"
                    );
                    continue;
                }
            };
            if !accepted {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| target.handle(envelope.clone()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        target = target.name(),
                        event_type = envelope.event_type(),
                        error = %e,
                        "Event target failed to handle event"
                    );
                }
                Err(_) => {
                    error!(
                        target = target.name(),
                        event_type = envelope.event_type(),
                        "Event target panicked in handle"
                    );
                }
            }
        }
    }
}

/// Non-owning reference to a [`Dispatcher`].
///
/// Subscribers are owned by the dispatcher, so a subscriber holding an `Arc`
/// back to it would form a cycle.
#[derive(Debug, Clone, Default)]
pub struct DispatcherHandle(Weak<Dispatcher>);

impl DispatcherHandle {
    /// Dispatch through the referenced dispatcher. Returns `false` if it is gone.
    pub fn dispatch(&self, source: &str, event: impl Into<Event>) -> bool {
        match self.0.upgrade() {
            Some(dispatcher) => {
                dispatcher.dispatch(source, event);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.target_count())
            .finish()
    }
}
