//! Axum server setup and router configuration.

use crate::api::{ingest, status};
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Buildbot batches status pushes into large bodies.
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status::recent_events))
        .route("/health", get(health_check))
        .route("/buildbot", post(ingest::buildbot_hook))
        .route("/redmine/", post(ingest::redmine_hook))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use central_core::dispatch::{Dispatcher, EventTarget, TargetError};
    use central_core::events::{Envelope, Event};
    use central_core::processors::EventHistory;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    #[derive(Default)]
    struct Capture(Mutex<Vec<Arc<Envelope>>>);

    impl EventTarget for Capture {
        fn accepts(&self, _: &Envelope) -> bool {
            true
        }

        fn handle(&self, event: Arc<Envelope>) -> Result<(), TargetError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn setup() -> (Router, Arc<Capture>) {
        let dispatcher = Arc::new(Dispatcher::new());
        let history = Arc::new(EventHistory::default());
        let capture = Arc::new(Capture::default());
        dispatcher.register(history.clone());
        dispatcher.register(capture.clone());
        (build_router(AppState::new(dispatcher, history)), capture)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = setup();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_buildbot_hook_dispatches_raw_event() {
        let (router, capture) = setup();
        let response = router
            .oneshot(post_json("/buildbot", r#"{"event": "finished", "build": {"number": 3}}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = capture.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source(), "webserver");
        match events[0].event() {
            Event::RawBbHook(hook) => assert_eq!(hook.raw["build"]["number"], 3),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_buildbot_hook_rejects_empty_payload() {
        for body in ["", "null", "{}", "not json"] {
            let (router, capture) = setup();
            let response = router.oneshot(post_json("/buildbot", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
            assert!(capture.0.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_redmine_hook_uses_payload_action() {
        let (router, capture) = setup();
        let response = router
            .oneshot(post_json(
                "/redmine/",
                r#"{"payload": {"action": "opened", "issue": {"id": 12345}}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = capture.0.lock().unwrap();
        match events[0].event() {
            Event::RawRedmineHook(hook) => {
                assert_eq!(hook.rm_type, "opened");
                assert_eq!(hook.raw["issue"]["id"], 12345);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_redmine_hook_requires_payload() {
        for body in [r#"{"issue": {}}"#, r#"{"payload": {"issue": {}}}"#] {
            let (router, capture) = setup();
            let response = router.oneshot(post_json("/redmine/", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert!(capture.0.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_status_page_lists_recent_events() {
        let (router, _) = setup();
        let response = router
            .clone()
            .oneshot(post_json("/buildbot", r#"{"event": "started"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        router
            .clone()
            .oneshot(post_json("/redmine/", r#"{"payload": {"action": "updated"}}"#))
            .await
            .unwrap();

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let recent = body["recent"].as_array().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0]["event"]["type"], "raw_bb_hook");
        assert_eq!(recent[0]["event"]["source"], "webserver");
        assert!(body["by_type"].get("raw_redmine_hook").is_none());
    }
}
