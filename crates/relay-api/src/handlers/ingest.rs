//! Event ingestion handler.
//!
//! Validates the inbound JSON, maps it into an [`Event`](relay_core::Event),
//! and hands it to the queue. The response only acknowledges acceptance;
//! delivery happens asynchronously.

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use relay_core::{CorrelationId, IncomingEvent};
use relay_delivery::CORRELATION_ID_HEADER;
use serde::Serialize;
use tracing::{info, instrument, warn, Span};

use crate::{error::ApiError, AppState};

/// Response for an accepted event.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `accepted`
    pub status: &'static str,
    /// Identifier assigned to the event
    pub event_id: String,
    /// Correlation ID propagated downstream
    pub correlation_id: String,
}

/// Accepts one event for asynchronous delivery.
///
/// # Errors
///
/// - 400 `E1001` for malformed JSON, missing or empty required fields, or
///   non-object metadata
/// - 500 `E3001` when the event ID cannot be generated
/// - 503 `E3002`/`E3003`/`E3004` when the queue is closed, stays full past the
///   enqueue timeout, or the service is shutting down
#[instrument(
    name = "ingest_event",
    skip(state, headers, body),
    fields(content_length = body.len(), event_id, correlation_id)
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let incoming: IncomingEvent = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "rejecting malformed event");
        ApiError::InvalidPayload(e.to_string())
    })?;
    incoming.validate().inspect_err(|e| warn!(error = %e, "rejecting invalid event"))?;

    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(CorrelationId::parse)
        .unwrap_or_else(CorrelationId::generate);

    let event = state.mapper.map(incoming, Some(correlation_id.clone()))?;
    let event_id = event.id().clone();

    let span = Span::current();
    span.record("event_id", event_id.as_str());
    span.record("correlation_id", correlation_id.as_str());

    match tokio::time::timeout(state.enqueue_timeout, state.queue.enqueue(event, &state.cancel))
        .await
    {
        Ok(Ok(())) => {},
        Ok(Err(error)) => {
            warn!(error = %error, "queue rejected event");
            return Err(error.into());
        },
        Err(_elapsed) => {
            warn!(
                timeout_ms = state.enqueue_timeout.as_millis(),
                queue_depth = state.queue.len(),
                "queue full, rejecting event"
            );
            return Err(ApiError::QueueFull);
        },
    }

    info!(queue_depth = state.queue.len(), "event accepted");

    Ok(Json(IngestResponse {
        status: "accepted",
        event_id: event_id.to_string(),
        correlation_id: correlation_id.to_string(),
    }))
}
