//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

use bloomgate_api::routes;
use bloomgate_api::state::AppState;
use bloomgate_dispatch::{EventQueue, EventReceiver, event_queue};
use bloomgate_providers::provider::IssueProvider;
use bloomgate_test_support::FixedClock;

/// A fully wired app plus the queue ends, so tests can observe what the
/// webhook handlers enqueued. The receiver must stay alive for the
/// duration of the test or enqueues fail as queue-closed.
pub struct TestApp {
    pub app: Router,
    pub queue: EventQueue,
    pub receiver: EventReceiver,
}

/// Fixed timestamp used across all integration tests.
pub fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 15, 12, 0, 0).unwrap()
}

/// Build the full app router around the given provider with a
/// deterministic clock. Uses the same route structure as `main.rs`.
pub fn build_test_app(provider: Arc<dyn IssueProvider>) -> TestApp {
    let (queue, receiver) = event_queue(100);
    let state = AppState::new(
        provider,
        queue.clone(),
        Arc::new(FixedClock(fixed_now())),
        true,
    );

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::webhooks::router())
        .merge(routes::sprint::router())
        .merge(routes::tasks::router())
        .with_state(state);

    TestApp {
        app,
        queue,
        receiver,
    }
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request with a raw body and one extra header. Used for
/// webhook deliveries, where the signature travels in a header and the
/// body must stay byte-exact.
pub async fn post_raw(
    app: Router,
    uri: &str,
    body: Vec<u8>,
    header: (&str, &str),
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(header.0, header.1)
        .body(Body::from(body))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    // Some responses (e.g. axum's built-in JSON rejections) carry a
    // plain-text body; surface those as Null so status-only assertions
    // still work.
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}
