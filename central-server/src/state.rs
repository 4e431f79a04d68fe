//! Application state shared across all request handlers.

use central_core::dispatch::Dispatcher;
use central_core::processors::EventHistory;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher the ingestion endpoints feed.
    pub dispatcher: Arc<Dispatcher>,
    /// Recent events, rendered by the status page.
    pub history: Arc<EventHistory>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, history: Arc<EventHistory>) -> Self {
        Self {
            dispatcher,
            history,
        }
    }
}
