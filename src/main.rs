//! Event relay service.
//!
//! Accepts events over HTTP, buffers them in a bounded queue, and forwards
//! them downstream from a worker pool. Coordinates graceful startup and
//! shutdown of all subsystems.

use std::sync::Arc;

use anyhow::{Context, Result};
use relay_api::{create_router, serve, AppState, Config};
use relay_core::EventMapper;
use relay_delivery::{BoundedQueue, DeliveryError, Forwarder, ForwardingProcessor, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!("Starting event relay");

    let addr = config.parse_server_addr()?;
    info!(
        server_addr = %addr,
        external_endpoint_url = %config.external_endpoint_url,
        queue_size = config.queue_size,
        worker_count = config.worker_count,
        max_retries = config.max_retries,
        "Configuration loaded"
    );

    let forwarder =
        Forwarder::new(config.to_forwarder_config()).context("Failed to build forwarder")?;
    let processor = ForwardingProcessor::new(forwarder, config.external_endpoint_url.clone());
    let queue = Arc::new(BoundedQueue::new(config.queue_size));

    let root = CancellationToken::new();
    let mut pool = WorkerPool::new(Arc::clone(&queue), Arc::new(processor), config.worker_count);
    pool.start(root.clone()).await.context("Failed to start worker pool")?;

    let state = AppState::new(
        Arc::clone(&queue),
        EventMapper::with_defaults(),
        config.enqueue_timeout(),
        root.clone(),
    );
    let router = create_router(state, config.request_timeout());

    let http_shutdown = CancellationToken::new();
    let listener =
        tokio::net::TcpListener::bind(addr).await.context("Failed to bind HTTP listener")?;
    let server_handle = tokio::spawn(serve(listener, router, http_shutdown.clone()));

    info!(addr = %addr, "Event relay is ready to receive events");

    shutdown_signal().await;
    info!("Shutdown signal received, starting graceful shutdown");

    http_shutdown.cancel();
    match server_handle.await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    match pool.shutdown(config.shutdown_timeout()).await {
        Ok(()) => info!(remaining = queue.len(), "Worker pool drained"),
        Err(e @ DeliveryError::ShutdownTimeout { .. }) => {
            warn!(error = %e, remaining = queue.len(), "Worker pool did not drain before deadline");
        },
        Err(e) => error!(error = %e, "Worker pool shutdown failed"),
    }

    root.cancel();

    info!("Event relay shutdown complete");
    Ok(())
}

/// Initializes tracing with the configured filter directives.
///
/// Falls back to `info` when the directives do not parse.
fn init_tracing(directives: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C signal");
        },
        () = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
