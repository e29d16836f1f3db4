//! HTTP request handlers.
//!
//! - `ingest` - event ingestion
//! - `health` - liveness with queue depth

pub mod health;
pub mod ingest;

pub use health::health_check;
pub use ingest::ingest_event;
