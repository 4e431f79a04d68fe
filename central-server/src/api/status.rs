use axum::{Json, extract::State};
use central_core::processors::HistorySnapshot;

use crate::state::AppState;

/// `GET /` – recent events, newest first, overall and per type.
pub async fn recent_events(State(state): State<AppState>) -> Json<HistorySnapshot> {
    Json(state.history.snapshot())
}
