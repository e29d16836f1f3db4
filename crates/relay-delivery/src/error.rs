//! Error types for queueing and forwarding events.
//!
//! Forwarding errors carry enough context for retry decisions and logs; queue
//! errors are kept separate because the ingestion boundary maps them straight
//! to client responses.

use std::fmt;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors raised while forwarding events or running the worker pool.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Connection to the downstream endpoint failed.
    #[error("network connection failed: {message}")]
    Network {
        /// Transport error description
        message: String,
    },

    /// Downstream did not answer within the per-request timeout.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// The caller's cancellation token fired.
    #[error("delivery cancelled")]
    Cancelled,

    /// Every attempt answered with a non-2xx status.
    #[error("request failed with status code {status_code} after {attempts} attempts")]
    RetriesExhausted {
        /// Status of the final attempt
        status_code: u16,
        /// Total attempts made
        attempts: u32,
    },

    /// Outbound payload could not be encoded.
    #[error("failed to serialize payload: {message}")]
    Serialization {
        /// Encoder error message
        message: String,
    },

    /// Forwarder configuration is unusable.
    #[error("invalid forwarder configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Workers were still running when the shutdown deadline passed.
    #[error("shutdown timed out after {timeout_ms}ms with {active_workers} workers still running")]
    ShutdownTimeout {
        /// Deadline that elapsed, in milliseconds
        timeout_ms: u64,
        /// Workers that had not stopped yet
        active_workers: usize,
    },

    /// A worker task panicked.
    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanic {
        /// Identifier of the failed worker
        worker_id: usize,
        /// Panic or join error description
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Creates a retries exhausted error.
    pub fn retries_exhausted(status_code: u16, attempts: u32) -> Self {
        Self::RetriesExhausted { status_code, attempts }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether the failure is transient.
    ///
    /// Only transport failures count. The forwarder spends its whole retry
    /// budget on any failed attempt regardless; non-2xx statuses surface as
    /// `RetriesExhausted` afterwards.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,

            Self::Cancelled
            | Self::RetriesExhausted { .. }
            | Self::Serialization { .. }
            | Self::Configuration { .. }
            | Self::ShutdownTimeout { .. }
            | Self::WorkerPanic { .. } => false,
        }
    }
}

/// Category of delivery error for log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport failures and timeouts.
    Network,
    /// Downstream kept answering with non-2xx statuses.
    Downstream,
    /// Cancellation or shutdown.
    Lifecycle,
    /// Payload or configuration problems.
    Configuration,
    /// Worker failures.
    Internal,
}

impl From<&DeliveryError> for ErrorCategory {
    fn from(error: &DeliveryError) -> Self {
        match error {
            DeliveryError::Network { .. } | DeliveryError::Timeout { .. } => Self::Network,
            DeliveryError::RetriesExhausted { .. } => Self::Downstream,
            DeliveryError::Cancelled | DeliveryError::ShutdownTimeout { .. } => Self::Lifecycle,
            DeliveryError::Serialization { .. } | DeliveryError::Configuration { .. } => {
                Self::Configuration
            },
            DeliveryError::WorkerPanic { .. } => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Downstream => write!(f, "downstream"),
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Reasons the bounded queue refuses an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue has been closed; no further items are accepted.
    #[error("queue is closed")]
    Closed,

    /// Caller cancelled while waiting for a free slot.
    #[error("enqueue cancelled")]
    Cancelled,
}
