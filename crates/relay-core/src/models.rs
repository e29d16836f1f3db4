//! Domain models and strongly-typed identifiers.
//!
//! Defines the canonical [`Event`] relayed by the pipeline, the untyped
//! [`IncomingEvent`] accepted at the ingestion boundary, and newtype wrappers
//! for event and correlation identifiers.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Opaque key/value metadata carried through the relay untouched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Strongly-typed event identifier.
///
/// Assigned exactly once when an event is mapped and never reassigned. The
/// identifier follows the event through the queue and into the outbound
/// payload.
///
/// # Example
///
/// ```
/// use relay_core::EventId;
/// let event_id = EventId::new("9f86d081884c7d659a2feaa0c55ad015");
/// assert_eq!(event_id.as_str(), "9f86d081884c7d659a2feaa0c55ad015");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wraps an already generated identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token propagated end-to-end for tracing a single event's journey.
///
/// An empty token means "unset", so construction from untrusted input goes
/// through [`CorrelationId::parse`], which yields `None` for blank values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh correlation ID: 16 random bytes, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Parses a correlation ID from a header or payload value.
    ///
    /// Returns `None` when the value is empty or whitespace only.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event priority derived from free-text severity.
///
/// Ordering is informational only: the queue is strict FIFO and never
/// schedules by priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Default for unknown or empty severities
    #[default]
    Low,
    /// `medium`, `warning`, `warn`
    Medium,
    /// `high`, `error`
    High,
    /// `critical`, `fatal`, `emergency`
    Critical,
}

impl Priority {
    /// Normalizes a free-text severity into a priority.
    ///
    /// The input is trimmed and lowercased before lookup. Anything that is not
    /// a recognized severity maps to [`Priority::Low`]; unknown severities are
    /// never rejected.
    ///
    /// ```
    /// use relay_core::Priority;
    /// assert_eq!(Priority::from_severity(" FATAL "), Priority::Critical);
    /// assert_eq!(Priority::from_severity("bogus"), Priority::Low);
    /// ```
    pub fn from_severity(severity: &str) -> Self {
        match severity.trim().to_lowercase().as_str() {
            "critical" | "fatal" | "emergency" => Self::Critical,
            "high" | "error" => Self::High,
            "medium" | "warning" | "warn" => Self::Medium,
            _ => Self::Low,
        }
    }

    /// Wire representation used in the outbound payload.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped event as accepted at the ingestion boundary.
///
/// `source`, `event_type`, `severity` and `message` are required; presence is
/// enforced by deserialization and non-emptiness by [`IncomingEvent::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    /// System that emitted the event
    pub source: String,
    /// Free-form event classification
    pub event_type: String,
    /// Free-text severity, normalized into a [`Priority`] during mapping
    pub severity: String,
    /// Human-readable event message
    pub message: String,
    /// Optional opaque metadata object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl IncomingEvent {
    /// Checks that every required field carries a non-empty value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPayload`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("source", &self.source),
            ("event_type", &self.event_type),
            ("severity", &self.severity),
            ("message", &self.message),
        ];

        for (field, value) in required {
            if value.is_empty() {
                return Err(CoreError::invalid_payload(format!("required field `{field}` is empty")));
            }
        }

        Ok(())
    }
}

/// Canonical unit of relayed work.
///
/// Created once by the [`EventMapper`](crate::EventMapper) and immutable
/// afterwards: fields are private and only exposed through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: EventId,
    source: String,
    event_type: String,
    priority: Priority,
    message: String,
    timestamp: DateTime<Utc>,
    correlation_id: Option<CorrelationId>,
    metadata: Option<Metadata>,
}

impl Event {
    pub(crate) fn new(
        id: EventId,
        incoming: IncomingEvent,
        timestamp: DateTime<Utc>,
        correlation_id: Option<CorrelationId>,
    ) -> Self {
        Self {
            id,
            priority: Priority::from_severity(&incoming.severity),
            source: incoming.source,
            event_type: incoming.event_type,
            message: incoming.message,
            timestamp,
            correlation_id,
            metadata: incoming.metadata,
        }
    }

    /// Unique event identifier.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Emitting system.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Event classification.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Priority normalized from the inbound severity.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Event message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// UTC instant the event was mapped.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Correlation ID, if one was assigned.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    /// Opaque metadata, if the inbound event carried any.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}
