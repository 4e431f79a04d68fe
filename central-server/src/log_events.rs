//! Forwards log records into the event stream.
//!
//! Every record that passes the subscriber's filter is dispatched as an
//! `internal_log` event with source `logging`, so it shows up on the status
//! page next to everything else.

use std::cell::Cell;
use std::fmt::Write as _;

use central_core::dispatch::DispatcherHandle;
use central_core::events::InternalLog;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

pub const LOGGING_SOURCE: &str = "logging";

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as forwarding until dropped.
///
/// Records emitted while dispatching an `internal_log` event (the dispatcher
/// and its subscribers log too) are not forwarded again.
struct ForwardingGuard;

impl ForwardingGuard {
    fn enter() -> Option<Self> {
        if FORWARDING.replace(true) {
            None
        } else {
            Some(Self)
        }
    }
}

impl Drop for ForwardingGuard {
    fn drop(&mut self) {
        FORWARDING.set(false);
    }
}

pub struct EventLogLayer {
    dispatcher: DispatcherHandle,
}

impl EventLogLayer {
    pub fn new(dispatcher: DispatcherHandle) -> Self {
        Self { dispatcher }
    }
}

impl<S: Subscriber> Layer<S> for EventLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(_guard) = ForwardingGuard::enter() else {
            return;
        };
        self.dispatcher.dispatch(LOGGING_SOURCE, internal_log(event));
    }
}

fn internal_log(event: &Event<'_>) -> InternalLog {
    let metadata = event.metadata();
    let mut fields = RecordFields::default();
    event.record(&mut fields);

    InternalLog {
        level: metadata.level().to_string(),
        pathname: metadata.file().unwrap_or(metadata.target()).to_string(),
        lineno: metadata.line().unwrap_or(0),
        msg: fields.message,
        args: fields.args,
    }
}

/// The `message` field, plus every other field as `name=value`.
#[derive(Default)]
struct RecordFields {
    message: String,
    args: String,
}

impl RecordFields {
    fn push_arg(&mut self, field: &Field, value: std::fmt::Arguments<'_>) {
        if !self.args.is_empty() {
            self.args.push(' ');
        }
        let _ = write!(self.args, "{}={}", field.name(), value);
    }
}

impl Visit for RecordFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_arg(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_arg(field, format_args!("{value:?}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use central_core::dispatch::{Dispatcher, EventTarget, TargetError};
    use central_core::events::Envelope;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<Arc<Envelope>>>,
    }

    impl EventTarget for Collector {
        fn accepts(&self, event: &Envelope) -> bool {
            event.event_type() == "internal_log"
        }

        fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
            // Logged while an internal_log event is being dispatched.
            tracing::warn!("collector saw a record");
            self.seen.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[test]
    fn test_records_dispatched_as_internal_log() {
        let dispatcher = Arc::new(Dispatcher::new());
        let collector = Arc::new(Collector::default());
        dispatcher.register(collector.clone());

        let subscriber =
            tracing_subscriber::registry().with(EventLogLayer::new(dispatcher.handle()));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(pr = 5, repo = "dolphin-emu/dolphin", "Checked pull request");
        });

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 1, "records logged while forwarding must not loop");
        assert_eq!(seen[0].source(), LOGGING_SOURCE);
        match seen[0].event() {
            central_core::events::Event::InternalLog(log) => {
                assert_eq!(log.level, "INFO");
                assert_eq!(log.msg, "Checked pull request");
                assert_eq!(log.args, "pr=5 repo=dolphin-emu/dolphin");
                assert!(log.pathname.ends_with("log_events.rs"), "{}", log.pathname);
                assert!(log.lineno > 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_nothing_forwarded_after_dispatcher_dropped() {
        let dispatcher = Arc::new(Dispatcher::new());
        let layer = EventLogLayer::new(dispatcher.handle());
        drop(dispatcher);

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("still fine");
        });
        // The guard was released, so forwarding works again on this thread.
        assert!(ForwardingGuard::enter().is_some());
    }
}
