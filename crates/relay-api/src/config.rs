//! Configuration management for the event relay.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use relay_delivery::{ForwarderConfig, RetryPolicy};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// Service configuration layered from defaults, file, and environment.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Values are only type-checked. Zero queue sizes and worker counts are
/// accepted and fall back to the delivery crate's defaults.
///
/// # Example
///
/// ```no_run
/// use relay_api::Config;
///
/// let config = Config::load()?;
/// println!("forwarding to {}", config.external_endpoint_url);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// Inbound request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_SECS`
    #[serde(default = "default_request_timeout_secs", alias = "REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,
    /// How long ingestion waits for a queue slot before answering 503.
    ///
    /// Environment variable: `ENQUEUE_TIMEOUT_MS`
    #[serde(default = "default_enqueue_timeout_ms", alias = "ENQUEUE_TIMEOUT_MS")]
    pub enqueue_timeout_ms: u64,

    // Pipeline
    /// Downstream URL events are forwarded to.
    ///
    /// Environment variable: `EXTERNAL_ENDPOINT_URL`
    #[serde(default = "default_external_endpoint_url", alias = "EXTERNAL_ENDPOINT_URL")]
    pub external_endpoint_url: String,
    /// Queue capacity.
    ///
    /// Environment variable: `QUEUE_SIZE`
    #[serde(default = "default_queue_size", alias = "QUEUE_SIZE")]
    pub queue_size: usize,
    /// Number of concurrent workers.
    ///
    /// Environment variable: `WORKER_COUNT`
    #[serde(default = "default_worker_count", alias = "WORKER_COUNT")]
    pub worker_count: usize,
    /// Grace period for draining the queue on shutdown, in seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[serde(default = "default_shutdown_timeout_secs", alias = "SHUTDOWN_TIMEOUT_SECS")]
    pub shutdown_timeout_secs: u64,

    // Forwarding
    /// Per-attempt HTTP timeout, as a human-readable duration (`3s`, `750ms`).
    ///
    /// Environment variable: `HTTP_TIMEOUT`
    #[serde(default = "default_http_timeout", with = "humantime_serde", alias = "HTTP_TIMEOUT")]
    pub http_timeout: Duration,
    /// Retries after the initial attempt.
    ///
    /// Environment variable: `MAX_RETRIES`
    #[serde(default = "default_max_retries", alias = "MAX_RETRIES")]
    pub max_retries: u32,
    /// Delay before the first retry, as a human-readable duration.
    ///
    /// Environment variable: `BASE_DELAY`
    #[serde(default = "default_base_delay", with = "humantime_serde", alias = "BASE_DELAY")]
    pub base_delay: Duration,

    // Logging
    /// Log filter directives for the tracing subscriber.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    ///
    /// # Errors
    ///
    /// Fails when a value cannot be parsed into its field type.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed("")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().context("Failed to load configuration")
    }

    /// Forwarder settings derived from the HTTP and retry fields.
    pub fn to_forwarder_config(&self) -> ForwarderConfig {
        ForwarderConfig {
            timeout: self.http_timeout,
            retry: self.to_retry_policy(),
            ..ForwarderConfig::default()
        }
    }

    /// Retry policy derived from `max_retries` and `base_delay`.
    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.base_delay)
    }

    /// Inbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Enqueue wait before rejecting with 503.
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }

    /// Shutdown drain deadline.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Parse server socket address from host and port configuration.
    ///
    /// # Errors
    ///
    /// Fails when `host:port` is not a valid socket address.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
            external_endpoint_url: default_external_endpoint_url(),
            queue_size: default_queue_size(),
            worker_count: default_worker_count(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            http_timeout: default_http_timeout(),
            max_retries: default_max_retries(),
            base_delay: default_base_delay(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_enqueue_timeout_ms() -> u64 {
    1000
}

fn default_external_endpoint_url() -> String {
    "http://localhost:8081/external/alerts".to_string()
}

fn default_queue_size() -> usize {
    relay_delivery::DEFAULT_QUEUE_CAPACITY
}

fn default_worker_count() -> usize {
    relay_delivery::DEFAULT_WORKER_COUNT
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

fn default_http_timeout() -> Duration {
    relay_delivery::DEFAULT_HTTP_TIMEOUT
}

fn default_max_retries() -> u32 {
    relay_delivery::DEFAULT_MAX_RETRIES
}

fn default_base_delay() -> Duration {
    relay_delivery::DEFAULT_BASE_DELAY
}

fn default_log_level() -> String {
    "info,relay=debug,tower_http=debug".to_string()
}
