//! Ingestion endpoint tests.
//!
//! Drives the router with `oneshot` requests against an in-memory queue and
//! checks acceptance, validation, correlation handling, and backpressure.

#![allow(clippy::unwrap_used)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use relay_api::{create_router, AppState};
use relay_core::{Event, EventMapper, RealClock};
use relay_delivery::BoundedQueue;
use relay_testing::{FailingIdGenerator, IncomingEventBuilder};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct Harness {
    router: Router,
    queue: Arc<BoundedQueue<Event>>,
    cancel: CancellationToken,
}

fn harness_with(capacity: usize, mapper: EventMapper) -> Harness {
    let queue = Arc::new(BoundedQueue::new(capacity));
    let cancel = CancellationToken::new();
    let state =
        AppState::new(Arc::clone(&queue), mapper, Duration::from_millis(100), cancel.clone());
    Harness { router: create_router(state, Duration::from_secs(5)), queue, cancel }
}

fn harness(capacity: usize) -> Harness {
    harness_with(capacity, EventMapper::with_defaults())
}

fn post(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/integrations/events")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn valid_event_is_accepted_and_enqueued() {
    let h = harness(10);
    let body = IncomingEventBuilder::new()
        .severity("CRITICAL")
        .metadata(json!({"host": "web-3"}))
        .to_json();

    let (status, json) = send(&h.router, post(body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "accepted");
    let event_id = json["event_id"].as_str().unwrap();
    assert_eq!(event_id.len(), 32);
    assert_eq!(json["correlation_id"].as_str().unwrap().len(), 32);
    assert_eq!(h.queue.len(), 1);

    let event = h.queue.dequeue(&h.cancel).await.unwrap();
    assert_eq!(event.id().as_str(), event_id);
    assert_eq!(event.priority().as_str(), "critical");
    assert_eq!(event.metadata().unwrap()["host"], "web-3");
}

#[tokio::test]
async fn inbound_correlation_header_is_honored() {
    let h = harness(10);
    let request = Request::builder()
        .method("POST")
        .uri("/integrations/events")
        .header("X-Correlation-ID", "trace-abc-123")
        .body(Body::from(IncomingEventBuilder::new().to_json().to_string()))
        .unwrap();

    let (status, json) = send(&h.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["correlation_id"], "trace-abc-123");
    let event = h.queue.dequeue(&h.cancel).await.unwrap();
    assert_eq!(event.correlation_id().unwrap().as_str(), "trace-abc-123");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let h = harness(10);

    let (status, json) = send(&h.router, post("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "E1001");
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn missing_or_empty_fields_are_bad_request() {
    let h = harness(10);
    let missing = json!({"source": "monitor", "event_type": "cpu", "message": "hot"});
    let empty = IncomingEventBuilder::new().source("").to_json();
    let bad_metadata = json!({
        "source": "monitor",
        "event_type": "cpu",
        "severity": "high",
        "message": "hot",
        "metadata": "not-an-object"
    });

    for body in [missing, empty, bad_metadata] {
        let (status, json) = send(&h.router, post(body.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(json["error"]["code"], "E1001");
    }
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn unknown_severity_is_accepted_as_low() {
    let h = harness(10);
    let body = IncomingEventBuilder::new().severity("bogus").to_json();

    let (status, _) = send(&h.router, post(body.to_string())).await;

    assert_eq!(status, StatusCode::OK);
    let event = h.queue.dequeue(&h.cancel).await.unwrap();
    assert_eq!(event.priority().as_str(), "low");
}

#[tokio::test]
async fn mapping_failure_is_internal_error() {
    let mapper = EventMapper::new(Arc::new(FailingIdGenerator), Arc::new(RealClock::new()));
    let h = harness_with(10, mapper);

    let (status, json) = send(&h.router, post(IncomingEventBuilder::new().to_json().to_string())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"]["code"], "E3001");
    assert!(h.queue.is_empty());
}

#[tokio::test]
async fn full_queue_is_service_unavailable() {
    let h = harness(1);
    let body = IncomingEventBuilder::new().to_json().to_string();

    let (first, _) = send(&h.router, post(body.clone())).await;
    let (second, json) = send(&h.router, post(body)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "E3003");
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test]
async fn closed_queue_is_service_unavailable() {
    let h = harness(10);
    h.queue.close().await;

    let (status, json) = send(&h.router, post(IncomingEventBuilder::new().to_json().to_string())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "E3002");
}

#[tokio::test]
async fn shutdown_cancels_waiting_requests() {
    let h = harness(1);
    h.cancel.cancel();

    let (status, json) = send(&h.router, post(IncomingEventBuilder::new().to_json().to_string())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "E3004");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let h = harness(10);

    let response = h.router.clone().oneshot(post("{}")).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
