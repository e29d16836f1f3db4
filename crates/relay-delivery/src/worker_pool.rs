//! Fixed-size worker pool draining the event queue.
//!
//! Each worker loops dequeue → process until the queue is closed and drained
//! or the pool's cancellation token fires. Failures are logged with the event
//! ID and the event is dropped; the pool never retries above the processor.

use std::{sync::Arc, time::Duration};

use relay_core::Event;
use tokio::{sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    error::{DeliveryError, Result},
    processor::EventProcessor,
    queue::BoundedQueue,
    DEFAULT_WORKER_COUNT,
};

/// Point-in-time counters for the worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers that have started and not yet stopped.
    pub active_workers: usize,
    /// Events taken off the queue.
    pub events_processed: u64,
    /// Events the processor handled successfully.
    pub successful: u64,
    /// Events the processor reported as failed.
    pub failed: u64,
    /// Events currently being processed.
    pub in_flight: usize,
}

/// Pool of workers bound to one queue and one processor.
pub struct WorkerPool {
    queue: Arc<BoundedQueue<Event>>,
    processor: Arc<dyn EventProcessor>,
    worker_count: usize,
    stats: Arc<RwLock<PoolStats>>,
    cancellation_token: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Creates a pool of `worker_count` workers.
    ///
    /// A count of zero falls back to [`DEFAULT_WORKER_COUNT`].
    pub fn new(
        queue: Arc<BoundedQueue<Event>>,
        processor: Arc<dyn EventProcessor>,
        worker_count: usize,
    ) -> Self {
        let worker_count = if worker_count == 0 { DEFAULT_WORKER_COUNT } else { worker_count };

        Self {
            queue,
            processor,
            worker_count,
            stats: Arc::new(RwLock::new(PoolStats::default())),
            cancellation_token: CancellationToken::new(),
            worker_handles: Vec::new(),
        }
    }

    /// Number of workers the pool runs once started.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Spawns the workers and returns immediately.
    ///
    /// Workers stop when the queue is closed and drained, or when `cancel`
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the pool was already started.
    pub async fn start(&mut self, cancel: CancellationToken) -> Result<()> {
        if !self.worker_handles.is_empty() {
            return Err(DeliveryError::configuration("worker pool already started"));
        }

        info!(worker_count = self.worker_count, "spawning relay workers");
        self.cancellation_token = cancel;

        {
            let mut stats = self.stats.write().await;
            stats.active_workers = self.worker_count;
        }

        for worker_id in 0..self.worker_count {
            let worker = Worker {
                id: worker_id,
                queue: Arc::clone(&self.queue),
                processor: Arc::clone(&self.processor),
                stats: Arc::clone(&self.stats),
                cancel: self.cancellation_token.clone(),
            };

            self.worker_handles.push(tokio::spawn(worker.run()));
        }

        info!(spawned_workers = self.worker_handles.len(), "all relay workers spawned");
        Ok(())
    }

    /// Closes the queue and waits up to `deadline` for workers to drain it.
    ///
    /// Workers still running at the deadline are left running detached; they
    /// are not aborted.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ShutdownTimeout` if the deadline passes first.
    pub async fn shutdown(mut self, deadline: Duration) -> Result<()> {
        let timeout_ms = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
        info!(
            worker_count = self.worker_handles.len(),
            timeout_ms,
            "initiating worker pool shutdown"
        );

        self.queue.close().await;

        let handles = std::mem::take(&mut self.worker_handles);
        let total = handles.len();
        let watch: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let join_all = async {
            let mut panics = 0;
            for (worker_id, handle) in handles.into_iter().enumerate() {
                if let Err(join_error) = handle.await {
                    let error =
                        DeliveryError::WorkerPanic { worker_id, message: join_error.to_string() };
                    error!(worker_id, error = %error, "worker task failed during shutdown");
                    panics += 1;
                }
            }
            panics
        };

        match tokio::time::timeout(deadline, join_all).await {
            Ok(panics) => {
                if panics > 0 {
                    warn!(panics, total_workers = total, "some workers failed during shutdown");
                }
                info!(remaining = self.queue.len(), "worker pool shutdown completed");
                Ok(())
            },
            Err(_elapsed) => {
                let active_workers = watch.iter().filter(|h| !h.is_finished()).count();
                error!(
                    timeout_ms,
                    active_workers, "worker shutdown timed out, workers left running"
                );
                Err(DeliveryError::ShutdownTimeout { timeout_ms, active_workers })
            },
        }
    }

    /// Whether any spawned worker is still running.
    pub fn has_active_workers(&self) -> bool {
        self.worker_handles.iter().any(|h| !h.is_finished())
    }

    /// Snapshot of the pool counters.
    pub async fn stats(&self) -> PoolStats {
        *self.stats.read().await
    }

    /// Shared handle to the pool counters.
    pub fn stats_handle(&self) -> Arc<RwLock<PoolStats>> {
        Arc::clone(&self.stats)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("spawned", &self.worker_handles.len())
            .finish_non_exhaustive()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let active_count = self.worker_handles.iter().filter(|h| !h.is_finished()).count();

        if active_count > 0 && !self.cancellation_token.is_cancelled() {
            error!(
                active_workers = active_count,
                "WorkerPool dropped without shutdown, cancelling {} workers", active_count
            );
            self.cancellation_token.cancel();
        }
    }
}

/// One consumer loop.
struct Worker {
    id: usize,
    queue: Arc<BoundedQueue<Event>>,
    processor: Arc<dyn EventProcessor>,
    stats: Arc<RwLock<PoolStats>>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let worker_id = self.id;
        info!(worker_id, "worker started");

        while let Some(event) = self.queue.dequeue(&self.cancel).await {
            let correlation_id = event.correlation_id().map_or("", |id| id.as_str());
            let span = info_span!(
                "process_event",
                worker_id,
                event_id = %event.id(),
                correlation_id = %correlation_id,
            );

            self.process(&event).instrument(span).await;
        }

        {
            let mut stats = self.stats.write().await;
            stats.active_workers = stats.active_workers.saturating_sub(1);
        }
        info!(worker_id, "worker shutting down");
    }

    async fn process(&self, event: &Event) {
        {
            let mut stats = self.stats.write().await;
            stats.events_processed += 1;
            stats.in_flight += 1;
        }

        debug!(priority = %event.priority(), "processing event");
        let result = self.processor.process(event, &self.cancel).await;

        let mut stats = self.stats.write().await;
        stats.in_flight = stats.in_flight.saturating_sub(1);
        match result {
            Ok(()) => stats.successful += 1,
            Err(error) => {
                stats.failed += 1;
                drop(stats);
                error!(event_id = %event.id(), error = %error, "failed to process event, dropping");
            },
        }
    }
}
