//! Translation of inbound payloads into canonical events.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{IdGenerationError, Result},
    models::{CorrelationId, Event, EventId, IncomingEvent},
    time::{Clock, RealClock},
};

/// Source of fresh event identifiers.
///
/// Injected into the [`EventMapper`] so tests can produce deterministic IDs
/// or simulate exhausted entropy.
pub trait IdGenerator: Send + Sync + std::fmt::Debug {
    /// Produces a new globally unique identifier.
    fn generate(&self) -> std::result::Result<EventId, IdGenerationError>;
}

/// Generates UUIDv4 identifiers in simple (32 lowercase hex) format.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> std::result::Result<EventId, IdGenerationError> {
        Ok(EventId::new(Uuid::new_v4().simple().to_string()))
    }
}

/// Maps untyped inbound events into immutable [`Event`]s.
///
/// The mapper assigns the ID and timestamp, and normalizes severity into a
/// [`Priority`](crate::Priority). It does not validate required fields; that
/// happens at the ingestion boundary before mapping.
#[derive(Debug, Clone)]
pub struct EventMapper {
    id_generator: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl EventMapper {
    /// Creates a mapper with injected ID and time sources.
    pub fn new(id_generator: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { id_generator, clock }
    }

    /// Creates a mapper using UUIDv4 identifiers and the wall clock.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(UuidGenerator), Arc::new(RealClock::new()))
    }

    /// Maps `incoming` into a canonical event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Mapping`](crate::CoreError::Mapping) when the ID
    /// generator fails.
    pub fn map(
        &self,
        incoming: IncomingEvent,
        correlation_id: Option<CorrelationId>,
    ) -> Result<Event> {
        let id = self.id_generator.generate()?;
        let timestamp = self.clock.now_utc();

        Ok(Event::new(id, incoming, timestamp, correlation_id))
    }
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::with_defaults()
    }
}
