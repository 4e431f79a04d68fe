//! Raw webhook ingestion.
//!
//! Payloads are not interpreted here: they are wrapped into a raw event and
//! dispatched for whichever subscriber knows the format.

use axum::{body::Bytes, extract::State};
use central_core::events::{RawBbHook, RawRedmineHook};
use serde_json::Value;

use super::{ApiError, WEBSERVER_SOURCE};
use crate::state::AppState;

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// `POST /buildbot` – status push from Buildbot.
pub async fn buildbot_hook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("could not find any payload"));
    }
    let raw: Value = serde_json::from_slice(&body)?;
    if is_empty(&raw) {
        return Err(ApiError::BadRequest("could not find any payload"));
    }

    state.dispatcher.dispatch(WEBSERVER_SOURCE, RawBbHook { raw });
    Ok("OK")
}

/// `POST /redmine/` – Redmine webhook. The event carries the `payload` object.
pub async fn redmine_hook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let mut packet: Value = serde_json::from_slice(&body)?;
    let raw = match packet.get_mut("payload") {
        Some(payload) if payload.is_object() => payload.take(),
        _ => return Err(ApiError::BadRequest("could not find payload object")),
    };
    let Some(rm_type) = raw.get("action").and_then(Value::as_str).map(str::to_string) else {
        return Err(ApiError::BadRequest("payload has no action"));
    };

    state
        .dispatcher
        .dispatch(WEBSERVER_SOURCE, RawRedmineHook { rm_type, raw });
    Ok("OK")
}
