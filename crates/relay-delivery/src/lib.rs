//! Asynchronous delivery pipeline for relayed events.
//!
//! Events accepted at the ingestion boundary are buffered in a
//! [`BoundedQueue`] and drained by a fixed [`WorkerPool`]. Each worker hands
//! its event to an [`EventProcessor`]; the production [`ForwardingProcessor`]
//! POSTs it downstream through a [`Forwarder`] that retries with exponential
//! backoff.
//!
//! # Architecture
//!
//! 1. **Enqueue** - producers block while the queue is full
//! 2. **Dequeue** - exactly one worker receives each event, in FIFO order
//! 3. **Forward** - up to `max_retries + 1` attempts with doubling delays
//! 4. **Drop** - failures are logged with the event ID; there is no
//!    dead-letter
//!
//! Shutdown closes the queue, lets workers drain the backlog, and waits up to
//! a deadline. Workers still busy at the deadline are left running.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use relay_delivery::{
//!     BoundedQueue, Forwarder, ForwarderConfig, ForwardingProcessor, WorkerPool,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> relay_delivery::Result<()> {
//! let queue = Arc::new(BoundedQueue::new(1000));
//! let forwarder = Forwarder::new(ForwarderConfig::default())?;
//! let processor = ForwardingProcessor::new(forwarder, "http://localhost:8081/external/alerts");
//!
//! let mut pool = WorkerPool::new(Arc::clone(&queue), Arc::new(processor), 10);
//! pool.start(CancellationToken::new()).await?;
//! pool.shutdown(Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

pub mod client;
pub mod error;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod worker_pool;

pub use client::{ForwardResponse, Forwarder, ForwarderConfig};
pub use error::{DeliveryError, ErrorCategory, QueueError, Result};
pub use processor::{EventProcessor, ForwardingProcessor, OutboundPayload, CORRELATION_ID_HEADER};
pub use queue::BoundedQueue;
pub use retry::RetryPolicy;
pub use worker_pool::{PoolStats, WorkerPool};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default number of concurrent workers.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Default per-attempt HTTP timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
