//! Error types for telemetry transport and ingestion.
//!
//! This module provides the error handling for the rearview client. All errors
//! implement the `std::error::Error` trait and carry structured context for
//! logging and recovery decisions.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: Socket creation, connect, or thread start failures
//! - **I/O Errors**: Send/receive failures on a live session
//! - **Decode Errors**: Frame payloads or beacons that cannot be decoded
//! - **Protocol Errors**: Schema violations from the emitter (fatal to the client)
//! - **Config Errors**: Invalid [`ClientConfig`](crate::ClientConfig) values
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use rearview::TelemetryError;
//!
//! let error = TelemetryError::connection_failed("no emitter listening");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to connect to emitter: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Socket I/O failed during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Frame length {length} exceeds limit of {max} bytes")]
    FrameTooLarge { length: u32, max: u32 },

    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },

    #[error("Invalid configuration for '{field}': {details}")]
    Config { field: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Connection { .. } => true,
            TelemetryError::Io { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Decode { .. } => false,
            TelemetryError::FrameTooLarge { .. } => false,
            TelemetryError::Protocol { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure the instrumented application is running",
                "Check that the session port is reachable",
                "Wait for the next discovery beacon and retry",
            ],
            TelemetryError::Io { .. } => vec![
                "Reconnect to the emitter",
                "Check network stability between client and emitter",
            ],
            TelemetryError::Decode { .. } => vec![
                "Verify emitter and client protocol versions match",
                "Check for a foreign service on the session port",
            ],
            TelemetryError::FrameTooLarge { .. } => vec![
                "Raise max_frame_len if the emitter sends large packets",
                "Verify emitter and client agree on the length prefix width",
            ],
            TelemetryError::Protocol { .. } => vec![
                "Verify emitter and client protocol versions match",
                "Check the emitter's channel registration order",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration value ranges",
                "Fall back to ClientConfig::default()",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the emitter is responding",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for socket I/O errors.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for decode errors.
    pub fn decode_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol_violation(reason: impl Into<String>) -> Self {
        TelemetryError::Protocol { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(field: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { field: field.into(), details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { context: "<unknown>".to_string(), source: err }
    }
}

impl From<postcard::Error> for TelemetryError {
    fn from(err: postcard::Error) -> Self {
        TelemetryError::Decode { context: "postcard".to_string(), details: err.to_string() }
    }
}
