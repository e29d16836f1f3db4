//! Test utilities for the event relay.
//!
//! Provides a recording downstream sink backed by wiremock and fixtures for
//! building inbound events and deterministic mappers. Used only from
//! integration tests.

#![allow(clippy::unwrap_used)]

pub mod fixtures;
pub mod http;

pub use fixtures::{
    mapped_event, FailingIdGenerator, IncomingEventBuilder, SequenceIdGenerator,
};
pub use http::{MockSink, RecordedRequest};
