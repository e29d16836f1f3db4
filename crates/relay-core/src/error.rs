//! Error types for event validation and mapping.
//!
//! Errors carry stable codes so the ingestion boundary can translate them into
//! client-facing responses without string matching.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while accepting and mapping inbound events.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Inbound payload is malformed or misses a required field (E1001).
    #[error("[E1001] Invalid payload: {message}")]
    InvalidPayload {
        /// What was wrong with the payload
        message: String,
    },

    /// Event could not be mapped because ID generation failed (E3001).
    #[error("[E3001] Event mapping failed: {0}")]
    Mapping(#[from] IdGenerationError),
}

impl CoreError {
    /// Creates an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload { message: message.into() }
    }

    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload { .. } => "E1001",
            Self::Mapping(_) => "E3001",
        }
    }
}

/// Failure reported by an [`IdGenerator`](crate::IdGenerator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to generate event ID: {message}")]
pub struct IdGenerationError {
    message: String,
}

impl IdGenerationError {
    /// Creates an ID generation error with the given cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
