//! Telemetry engine for RaceBox GPS/IMU data loggers.
//!
//! Turns the device's chunked byte stream into decoded records grouped into
//! recording sessions, and drives the history download protocol end to end.
//!
//! # Features
//!
//! - **Frame reassembly**: chunk-boundary independent, checksum validated, self-resynchronising
//! - **Typed records**: simple and extended schema variants with decoded flag fields
//! - **Sessions**: segmented on device boundary messages, written to sinks off the delivery path
//! - **Downloads**: cancellable, time-bounded, with configurable negative-ack retry
//!
//! # Architecture
//!
//! ```text
//! Transport -> FrameReassembler -> MessageDispatcher -> RecordDecoder -> SessionAccumulator
//!                                                                           |
//!                                                  SinkWorker task <- flushed Session
//! ```
//!
//! ## Example (captured stream)
//!
//! ```rust,no_run
//! use racebox::{Config, RaceBox};
//!
//! #[tokio::main]
//! async fn main() -> racebox::Result<()> {
//!     let config = Config::load_from("racebox.yaml")?;
//!     let sessions = RaceBox::decode_capture(&config, "capture.bin").await?;
//!     for session in &sessions {
//!         println!("{}: {} records", session.id, session.record_count());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod logging;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Decoding engine
pub mod protocol;
pub mod session;

// Download orchestration
pub mod controller;
pub mod device;
pub mod stream;
pub mod transport;
pub mod transports;

// Core exports
pub use config::Config;
pub use error::*;
pub use types::*;

// Main API exports
pub use controller::{
    DownloadController, DownloadOutcome, DownloadPhase, DownloadProgress, DownloadReport,
};
pub use device::DeviceMemory;
pub use protocol::Pipeline;
pub use session::{CsvSink, MemorySink, Session, SessionSink, SessionSummary};
pub use transport::Transport;
pub use transports::{ChannelHandle, ChannelTransport, ReplayTransport};

use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Unified entry point for downloads and offline decoding.
///
/// # Examples
///
/// ## Download over a channel-backed link
/// ```rust,no_run
/// use racebox::{ChannelTransport, Config, RaceBox};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() {
/// let (mut transport, handle) = ChannelTransport::pair("RaceBox Mini");
/// // hand `handle` to the BLE adapter task...
/// # drop(handle);
/// let report = RaceBox::download(&Config::default(), &mut transport, CancellationToken::new()).await;
/// println!("{} sessions", report.sessions.len());
/// # }
/// ```
pub struct RaceBox;

impl RaceBox {
    /// Sinks described by `config.output`.
    pub fn sinks_from_config(config: &Config) -> Vec<Box<dyn SessionSink>> {
        let mut sinks: Vec<Box<dyn SessionSink>> = Vec::new();
        if let Some(dir) = &config.output.csv_dir {
            sinks.push(Box::new(CsvSink::new(dir, &config.output.device_name)));
        }
        sinks
    }

    /// Download every stored session, writing to the sinks `config` describes.
    pub async fn download(
        config: &Config,
        transport: &mut dyn Transport,
        cancel: CancellationToken,
    ) -> DownloadReport {
        DownloadController::new(config)
            .run(transport, Self::sinks_from_config(config), cancel)
            .await
    }

    /// Decode a captured byte stream into sessions without a device.
    ///
    /// An open session at the end of the capture is flushed too.
    pub async fn decode_capture<P: AsRef<Path>>(config: &Config, path: P) -> Result<Vec<Session>> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;

        let mut pipeline = Pipeline::new(config.reassembler, config.decoder);
        pipeline.feed(&bytes);
        pipeline.flush();
        Ok(pipeline.drain_sessions())
    }
}
