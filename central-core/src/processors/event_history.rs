//! Bounded in-memory history of recent events.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::OffsetDateTime;

use crate::dispatch::{EventTarget, TargetError};
use crate::events::{Envelope, EventKind, RawRedmineHook};

/// Number of events kept overall and per type.
pub const DEFAULT_HISTORY_LEN: usize = 25;

/// Not shown on the status page; the payloads are large and uninteresting.
const HIDDEN_TYPES: &[&str] = &[RawRedmineHook::TYPE];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
    pub event: Envelope,
}

/// Newest first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HistorySnapshot {
    pub recent: Vec<HistoryEntry>,
    pub by_type: BTreeMap<&'static str, Vec<HistoryEntry>>,
}

type Stored = (OffsetDateTime, Arc<Envelope>);

#[derive(Debug, Default)]
struct HistoryState {
    recent: VecDeque<Stored>,
    by_type: HashMap<&'static str, VecDeque<Stored>>,
}

/// Accepts every event and remembers the last few.
#[derive(Debug)]
pub struct EventHistory {
    capacity: usize,
    state: Mutex<HistoryState>,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(HistoryState::default()),
        }
    }

    fn record(&self, received_at: OffsetDateTime, event: Arc<Envelope>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stored = (received_at, event);

        push_bounded(
            state.by_type.entry(stored.1.event_type()).or_default(),
            stored.clone(),
            self.capacity,
        );
        push_bounded(&mut state.recent, stored, self.capacity);
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let render = |events: &VecDeque<Stored>| -> Vec<HistoryEntry> {
            events
                .iter()
                .rev()
                .filter(|(_, event)| !HIDDEN_TYPES.contains(&event.event_type()))
                .map(|(received_at, event)| HistoryEntry {
                    received_at: *received_at,
                    event: Envelope::clone(event),
                })
                .collect()
        };

        HistorySnapshot {
            recent: render(&state.recent),
            by_type: state
                .by_type
                .iter()
                .filter(|(event_type, _)| !HIDDEN_TYPES.contains(*event_type))
                .map(|(event_type, events)| (*event_type, render(events)))
                .collect(),
        }
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, item: T, capacity: usize) {
    if queue.len() == capacity {
        queue.pop_front();
    }
    queue.push_back(item);
}

impl EventTarget for EventHistory {
    fn name(&self) -> &str {
        "event_history"
    }

    fn accepts(&self, _event: &Envelope) -> bool {
        true
    }

    fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
        self.record(OffsetDateTime::now_utc(), event);
        Ok(())
    }
}
