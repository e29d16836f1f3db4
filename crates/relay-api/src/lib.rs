//! HTTP ingestion API for the event relay.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{sync::Arc, time::Duration};

use relay_core::{Event, EventMapper};
use relay_delivery::BoundedQueue;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use error::{ApiError, ErrorDetail, ErrorResponse};
pub use server::{create_router, serve};

/// State shared by all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Queue accepted events are handed to
    pub queue: Arc<BoundedQueue<Event>>,
    /// Maps inbound payloads into events
    pub mapper: EventMapper,
    /// How long an ingest request waits for a queue slot
    pub enqueue_timeout: Duration,
    /// Fires when the service is shutting down
    pub cancel: CancellationToken,
}

impl AppState {
    /// Creates handler state around `queue`.
    pub fn new(
        queue: Arc<BoundedQueue<Event>>,
        mapper: EventMapper,
        enqueue_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self { queue, mapper, enqueue_timeout, cancel }
    }
}
