//! The dispatched form of an event.

use serde::{Deserialize, Serialize};

use super::types::Event;

/// An event as delivered to subscribers: the payload plus its provenance.
///
/// Built once per dispatch and shared between subscribers behind an `Arc`,
/// so it is immutable. A subscriber that wants a derived event builds a new
/// one and dispatches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    source: String,
    #[serde(flatten)]
    event: Event,
}

impl Envelope {
    pub fn new(source: impl Into<String>, event: impl Into<Event>) -> Self {
        Self {
            source: source.into(),
            event: event.into(),
        }
    }

    /// Name of the producer that dispatched the event.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}
