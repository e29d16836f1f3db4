//! Per-event processing performed by workers.

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::Event;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    client::{ForwardResponse, Forwarder},
    error::{DeliveryError, ErrorCategory, Result},
};

/// Header carrying the correlation ID downstream.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Work a pool worker performs for each dequeued event.
#[async_trait]
pub trait EventProcessor: Send + Sync + 'static {
    /// Handles one event to completion.
    ///
    /// # Errors
    ///
    /// Any error is logged by the worker and the event is dropped; workers do
    /// not retry above this call.
    async fn process(&self, event: &Event, cancel: &CancellationToken) -> Result<()>;
}

/// Body POSTed to the downstream endpoint for each event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPayload<'a> {
    /// Event identifier
    pub event_id: &'a str,
    /// Emitting system
    pub source: &'a str,
    /// Event classification
    pub event_type: &'a str,
    /// Normalized priority
    pub priority: &'static str,
    /// Event message
    pub message: &'a str,
    /// RFC 3339 mapping timestamp
    pub timestamp: String,
    /// Correlation ID, empty when unset
    pub correlation_id: &'a str,
    /// Metadata encoded as a JSON string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

impl<'a> OutboundPayload<'a> {
    /// Builds the outbound body for `event`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Serialization` if the metadata cannot be
    /// encoded.
    pub fn from_event(event: &'a Event) -> Result<Self> {
        let metadata = event
            .metadata()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DeliveryError::serialization(format!("metadata: {e}")))?;

        Ok(Self {
            event_id: event.id().as_str(),
            source: event.source(),
            event_type: event.event_type(),
            priority: event.priority().as_str(),
            message: event.message(),
            timestamp: event.timestamp().to_rfc3339(),
            correlation_id: event.correlation_id().map_or("", |id| id.as_str()),
            metadata,
        })
    }
}

/// Processor that forwards each event to a fixed downstream URL.
#[derive(Debug, Clone)]
pub struct ForwardingProcessor {
    forwarder: Forwarder,
    target_url: String,
}

impl ForwardingProcessor {
    /// Creates a processor POSTing to `target_url` through `forwarder`.
    pub fn new(forwarder: Forwarder, target_url: impl Into<String>) -> Self {
        Self { forwarder, target_url: target_url.into() }
    }

    /// Downstream URL events are forwarded to.
    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    async fn forward(&self, event: &Event, cancel: &CancellationToken) -> Result<ForwardResponse> {
        let payload = OutboundPayload::from_event(event)?;

        let mut headers = HashMap::new();
        if let Some(correlation_id) = event.correlation_id() {
            headers.insert(CORRELATION_ID_HEADER.to_string(), correlation_id.to_string());
        }

        self.forwarder.send(&self.target_url, &payload, &headers, cancel).await
    }
}

#[async_trait]
impl EventProcessor for ForwardingProcessor {
    async fn process(&self, event: &Event, cancel: &CancellationToken) -> Result<()> {
        match self.forward(event, cancel).await {
            Ok(response) => {
                info!(
                    event_id = %event.id(),
                    status = response.status_code,
                    attempts = response.attempts,
                    response_body = %response.body,
                    "event forwarded"
                );
                Ok(())
            },
            Err(error) => {
                warn!(
                    event_id = %event.id(),
                    category = %ErrorCategory::from(&error),
                    error = %error,
                    "event forward failed"
                );
                Err(error)
            },
        }
    }
}
