//! Transport trait for the duplex byte channel to a device

use bytes::Bytes;

use crate::Result;

/// Duplex byte channel to a device.
///
/// Transports abstract over the link (BLE notifications, a serial port, a
/// captured dump). Chunk boundaries carry no meaning; the pipeline
/// reassembles frames from whatever sizes the link delivers.
///
/// [`next_chunk`](Transport::next_chunk) must be cancel-safe: the controller
/// polls it inside `tokio::select!` alongside cancellation and timeouts.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start delivery of inbound chunks.
    async fn subscribe(&mut self) -> Result<()>;

    /// Stop delivery of inbound chunks.
    async fn unsubscribe(&mut self) -> Result<()>;

    /// Write outbound command bytes.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait for the next inbound chunk.
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` - bytes received
    /// - `Ok(None)` - the device disconnected
    /// - `Err(e)` - the link failed
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Release the link.
    async fn disconnect(&mut self) -> Result<()>;
}
