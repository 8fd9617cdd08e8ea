//! Channel-backed transport
//!
//! The adapter that owns the real link (a BLE client, a serial reader) keeps
//! the [`ChannelHandle`] and forwards notifications into it; the controller
//! drives the [`ChannelTransport`] end. Dropping the handle is a disconnect.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use crate::transport::Transport;
use crate::{Result, TelemetryError};

/// Inbound chunks queued before back-pressure applies to the adapter.
const INBOUND_CAPACITY: usize = 256;

/// Controller side of a channel transport.
#[derive(Debug)]
pub struct ChannelTransport {
    name: String,
    inbound: mpsc::Receiver<Bytes>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    subscribed: watch::Sender<bool>,
    closed: bool,
}

/// Adapter side of a channel transport.
#[derive(Debug)]
pub struct ChannelHandle {
    inbound: mpsc::Sender<Bytes>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    subscribed: watch::Receiver<bool>,
}

impl ChannelTransport {
    /// Create a connected transport/handle pair.
    pub fn pair(name: impl Into<String>) -> (ChannelTransport, ChannelHandle) {
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (subscribed_tx, subscribed_rx) = watch::channel(false);

        let transport = ChannelTransport {
            name: name.into(),
            inbound: inbound_rx,
            outbound: outbound_tx,
            subscribed: subscribed_tx,
            closed: false,
        };
        let handle = ChannelHandle {
            inbound: inbound_tx,
            outbound: outbound_rx,
            subscribed: subscribed_rx,
        };
        (transport, handle)
    }

    fn is_subscribed(&self) -> bool {
        *self.subscribed.borrow()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(&mut self) -> Result<()> {
        if self.closed {
            return Err(TelemetryError::transport_failed("subscribe after disconnect"));
        }
        self.subscribed.send_replace(true);
        debug!(transport = %self.name, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.subscribed.send_replace(false);
        debug!(transport = %self.name, "Unsubscribed");
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_subscribed() {
            // Replies to a command sent now would be lost.
            return Err(TelemetryError::transport_failed("send before subscribe"));
        }
        self.outbound
            .send(bytes.to_vec())
            .map_err(|_| TelemetryError::transport_failed("adapter dropped the outbound channel"))?;
        trace!(transport = %self.name, length = bytes.len(), "Command sent");
        Ok(())
    }

    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        if !self.is_subscribed() {
            return Err(TelemetryError::transport_failed("read before subscribe"));
        }
        Ok(self.inbound.recv().await)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.subscribed.send_replace(false);
            self.inbound.close();
            debug!(transport = %self.name, "Disconnected");
        }
        Ok(())
    }
}

impl ChannelHandle {
    /// Deliver an inbound chunk. Fails once the transport has disconnected.
    pub async fn push(&self, chunk: impl Into<Bytes>) -> Result<()> {
        self.inbound
            .send(chunk.into())
            .await
            .map_err(|_| TelemetryError::transport_failed("transport closed"))
    }

    /// Wait for the next command written by the controller.
    ///
    /// Returns `None` once the transport is dropped.
    pub async fn next_command(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    pub fn is_subscribed(&self) -> bool {
        *self.subscribed.borrow()
    }

    /// Wait until the controller subscribes.
    pub async fn wait_subscribed(&mut self) -> Result<()> {
        self.subscribed
            .wait_for(|subscribed| *subscribed)
            .await
            .map(|_| ())
            .map_err(|_| TelemetryError::transport_failed("transport dropped"))
    }

    /// Whether the controller side has disconnected or been dropped.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }

    /// Simulate the device going away.
    pub fn disconnect(self) {
        drop(self);
    }
}
