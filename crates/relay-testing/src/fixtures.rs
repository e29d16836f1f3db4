//! Builders and deterministic sources for relay tests.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use relay_core::{
    CorrelationId, Event, EventId, EventMapper, IdGenerationError, IdGenerator, IncomingEvent,
    Metadata, RealClock, UuidGenerator,
};
use serde_json::Value;

/// Generates `00000000000000000000000000000001`, `...02` and so on.
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    next: AtomicU64,
}

impl SequenceIdGenerator {
    /// Creates a generator starting at 1.
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self) -> Result<EventId, IdGenerationError> {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(EventId::new(format!("{n:032x}")))
    }
}

/// Generator that always fails.
#[derive(Debug, Default)]
pub struct FailingIdGenerator;

impl IdGenerator for FailingIdGenerator {
    fn generate(&self) -> Result<EventId, IdGenerationError> {
        Err(IdGenerationError::new("entropy source unavailable"))
    }
}

/// Builder for inbound events with valid defaults.
#[derive(Debug, Clone)]
pub struct IncomingEventBuilder {
    event: IncomingEvent,
}

impl Default for IncomingEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IncomingEventBuilder {
    /// Starts from a valid `monitoring` / `cpu_high` / `high` event.
    pub fn new() -> Self {
        Self {
            event: IncomingEvent {
                source: "monitoring".to_string(),
                event_type: "cpu_high".to_string(),
                severity: "high".to_string(),
                message: "CPU above 90% for 5 minutes".to_string(),
                metadata: None,
            },
        }
    }

    /// Sets the source.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.event.source = source.into();
        self
    }

    /// Sets the event type.
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event.event_type = event_type.into();
        self
    }

    /// Sets the severity.
    #[must_use]
    pub fn severity(mut self, severity: impl Into<String>) -> Self {
        self.event.severity = severity.into();
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.event.message = message.into();
        self
    }

    /// Sets metadata from a JSON object; non-objects clear it.
    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.event.metadata = match metadata {
            Value::Object(map) => Some(map),
            _ => None::<Metadata>,
        };
        self
    }

    /// Returns the inbound event.
    pub fn build(self) -> IncomingEvent {
        self.event
    }

    /// Returns the event as a JSON request body.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.event).unwrap()
    }
}

/// Maps a default inbound event whose message names `n`.
///
/// IDs are random, so repeated calls never collide.
pub fn mapped_event(n: usize) -> Event {
    let mapper = EventMapper::new(Arc::new(UuidGenerator), Arc::new(RealClock::new()));
    let incoming = IncomingEventBuilder::new().message(format!("event {n}")).build();
    mapper.map(incoming, CorrelationId::parse(&format!("corr-{n}"))).unwrap()
}
