//! Error types for the StepX sensing engine.
//!
//! Nothing on the per-sample path returns these to the caller. Sample
//! problems are recovered locally as no-ops; store problems are logged.
//! Errors only surface from construction and configuration.

use thiserror::Error;

/// Errors surfaced by engine construction and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// The durable step counter could not be read at startup.
    #[error("durable step counter unavailable: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }
}

/// Errors reported by a durable step counter implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write was attempted and rejected.
    #[error("write of {delta} steps failed: {reason}")]
    WriteFailed {
        /// Increment that was being written.
        delta: u32,
        /// Backend-specific reason.
        reason: String,
    },

    /// The background writer thread is gone.
    #[error("background writer disconnected")]
    WorkerDisconnected,
}

impl StoreError {
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    #[must_use]
    pub fn write_failed(delta: u32, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            delta,
            reason: reason.into(),
        }
    }
}

/// Why a raw sample was discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SampleError {
    /// A reading was NaN or infinite.
    #[error("non-finite value in {field}")]
    NonFinite {
        /// Offending field.
        field: &'static str,
    },

    /// A reading was finite but physically impossible.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },
}

/// Result type for engine construction and configuration.
pub type Result<T> = std::result::Result<T, EngineError>;
