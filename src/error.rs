//! Error types for frame reassembly, decoding and download control.
//!
//! Errors fall into two tiers:
//!
//! - **Frame-local**: checksum mismatches, unknown messages, malformed record
//!   payloads and fix-policy rejections. These are handled where they occur
//!   (logged and counted) and never unwind past the reassembler.
//! - **Run-level**: disconnects, timeouts, cancellation, exhausted negative-ack
//!   retries and transport failures. These terminate a download and are reported
//!   to the caller in the [`DownloadReport`](crate::DownloadReport).
//!
//! ```rust
//! use racebox::TelemetryError;
//!
//! let error = TelemetryError::transport_failed("notification characteristic missing");
//! assert!(!error.is_frame_local());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Checksum mismatch: expected {expected:02X?}, found {found:02X?}")]
    ChecksumMismatch { expected: [u8; 2], found: [u8; 2] },

    #[error("Unknown message class {class:#04x} id {id:#04x}")]
    UnknownMessage { class: u8, id: u8 },

    #[error("Malformed {context}: expected {expected} payload bytes, got {actual}")]
    PayloadLength { context: &'static str, expected: usize, actual: usize },

    #[error("Record at iTOW {itow} has no valid fix")]
    NoFix { itow: u32 },

    #[error("Device disconnected before the download completed")]
    Disconnected,

    #[error("Device rejected the download command (attempt {attempt})")]
    NegativeAck { attempt: u32 },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Download cancelled")]
    Cancelled,

    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Sink '{sink}' failed: {reason}")]
    Sink { sink: String, reason: String },
}

impl TelemetryError {
    /// Returns whether this error is local to a single frame.
    ///
    /// Frame-local errors drop one frame or record and processing continues.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            TelemetryError::ChecksumMismatch { .. }
                | TelemetryError::UnknownMessage { .. }
                | TelemetryError::PayloadLength { .. }
                | TelemetryError::NoFix { .. }
        )
    }

    /// Returns whether starting a fresh download may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Disconnected => true,
            TelemetryError::NegativeAck { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Transport { .. } => true,
            TelemetryError::Sink { .. } => true,
            TelemetryError::Cancelled => false,
            TelemetryError::ChecksumMismatch { .. } => false,
            TelemetryError::UnknownMessage { .. } => false,
            TelemetryError::PayloadLength { .. } => false,
            TelemetryError::NoFix { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::ChecksumMismatch { .. } => vec![
                "Check radio signal quality between host and device",
                "Move the device closer to the host",
            ],
            TelemetryError::UnknownMessage { .. } => vec![
                "Check the device firmware version",
                "Update the library to a version that knows this message",
            ],
            TelemetryError::PayloadLength { .. } => vec![
                "Check the device firmware version",
                "Verify the stream was captured without truncation",
            ],
            TelemetryError::NoFix { .. } => vec![
                "Use the keep or suppress fix policy to tolerate fixless records",
                "Wait for a satellite fix before recording",
            ],
            TelemetryError::Disconnected => vec![
                "Keep the device powered and in range during the download",
                "Retry the download; already flushed sessions are kept",
            ],
            TelemetryError::NegativeAck { .. } => vec![
                "Stop any recording in progress on the device",
                "Increase the negative-ack retry budget",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the download timeout",
                "Check that the device is still transmitting",
            ],
            TelemetryError::Cancelled => vec!["Restart the download when ready"],
            TelemetryError::Transport { .. } => vec![
                "Reconnect to the device",
                "Forget the remembered device and rediscover it",
                "Check host Bluetooth permissions",
            ],
            TelemetryError::File { .. } => vec![
                "Check the path exists and is writable",
                "Ensure sufficient disk space",
                "Check file permissions",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the configuration file against the documented keys",
                "Remove the offending key to fall back to its default",
            ],
            TelemetryError::Sink { .. } => vec![
                "Check the output destination is reachable",
                "Inspect the sink's logs for the underlying failure",
            ],
        }
    }

    /// Helper constructor for transport failures.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport failures with source.
    pub fn transport_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into() }
    }

    /// Helper constructor for sink failures.
    pub fn sink_failed(sink: impl Into<String>, reason: impl Into<String>) -> Self {
        TelemetryError::Sink { sink: sink.into(), reason: reason.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::Config { reason: err.to_string() }
    }
}
