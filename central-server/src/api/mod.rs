//! HTTP endpoints.
//!
//! - `GET /`: recent events
//! - `POST /buildbot`: raw Buildbot status pushes
//! - `POST /redmine/`: raw Redmine webhooks

pub mod ingest;
pub mod status;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Source name of events produced by the HTTP endpoints.
pub const WEBSERVER_SOURCE: &str = "webserver";

/// Errors returned by the ingestion endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{0}")]
    BadRequest(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejected webhook payload");
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
