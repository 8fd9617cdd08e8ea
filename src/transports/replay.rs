//! Replay transport for captured byte streams

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::protocol::DOWNLOAD_COMMAND;
use crate::transport::Transport;
use crate::{Result, TelemetryError};

/// Default chunk size, roughly one BLE notification.
const DEFAULT_CHUNK_SIZE: usize = 244;

/// Plays back a captured device stream as if a device were sending it.
///
/// Playback starts when the download command is sent and ends with a
/// disconnect once the capture is exhausted.
#[derive(Debug)]
pub struct ReplayTransport {
    data: Bytes,
    position: usize,
    chunk_size: usize,
    pacing: Option<Duration>,
    subscribed: bool,
    started: bool,
    commands: Vec<Vec<u8>>,
}

impl ReplayTransport {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing: None,
            subscribed: false,
            started: false,
            commands: Vec::new(),
        }
    }

    /// Read a capture from disk.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        info!(path = %path.display(), bytes = data.len(), "Opened capture");
        Ok(Self::new(data))
    }

    /// Deliver at most `size` bytes per chunk. Zero is treated as one.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Wait this long before each chunk.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Commands written so far.
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    /// Bytes not yet delivered.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

#[async_trait]
impl Transport for ReplayTransport {
    fn name(&self) -> &str {
        "replay"
    }

    async fn subscribe(&mut self) -> Result<()> {
        self.subscribed = true;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed = false;
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.subscribed {
            return Err(TelemetryError::transport_failed("send before subscribe"));
        }
        self.commands.push(bytes.to_vec());
        if bytes == DOWNLOAD_COMMAND {
            if !self.started {
                debug!(bytes = self.data.len(), "Replay started");
            }
            self.started = true;
        } else {
            debug!(length = bytes.len(), "Ignoring command during replay");
        }
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.subscribed {
            return Err(TelemetryError::transport_failed("read before subscribe"));
        }
        if !self.started {
            return Err(TelemetryError::transport_failed("replay waits for the download command"));
        }
        if self.position >= self.data.len() {
            return Ok(None);
        }

        if let Some(pacing) = self.pacing {
            tokio::time::sleep(pacing).await;
        }

        let end = (self.position + self.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        Ok(Some(chunk))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.subscribed = false;
        Ok(())
    }
}
