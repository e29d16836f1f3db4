//! Core domain model for the event relay.
//!
//! Provides the canonical [`Event`] entity, severity-to-priority
//! normalization, the [`EventMapper`] that turns untyped inbound payloads into
//! events, and the clock abstraction shared by the delivery pipeline. All other
//! crates depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mapper;
pub mod models;
pub mod time;

pub use error::{CoreError, IdGenerationError, Result};
pub use mapper::{EventMapper, IdGenerator, UuidGenerator};
pub use models::{CorrelationId, Event, EventId, IncomingEvent, Metadata, Priority};
pub use time::{Clock, RealClock, TestClock};
