//! Validated wire frames and message routing keys

use bytes::Bytes;

use crate::protocol::{self, ChecksumValidator, message_id};

/// What a frame means, keyed by its `(class, id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Start of a history download; payload carries the record count.
    DownloadStart,
    /// One stored record replayed from device memory.
    HistoryRecord,
    /// One record streamed in real time.
    LiveRecord,
    /// Download complete.
    Ack,
    /// Command rejected.
    Nack,
    /// Standalone recording state changed; closes the current session.
    RecordingStateChanged,
    Unknown { class: u8, id: u8 },
}

impl MessageKind {
    pub fn from_ids(class: u8, id: u8) -> Self {
        if class != protocol::CLASS_RACEBOX {
            return MessageKind::Unknown { class, id };
        }
        match id {
            message_id::DOWNLOAD_START => MessageKind::DownloadStart,
            message_id::HISTORY_DATA => MessageKind::HistoryRecord,
            message_id::LIVE_DATA => MessageKind::LiveRecord,
            message_id::ACK => MessageKind::Ack,
            message_id::NACK => MessageKind::Nack,
            message_id::RECORDING_STATE => MessageKind::RecordingStateChanged,
            _ => MessageKind::Unknown { class, id },
        }
    }
}

/// A checksum-validated frame with its header stripped.
///
/// The payload shares the reassembly buffer's allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub class: u8,
    pub id: u8,
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(class: u8, id: u8, payload: impl Into<Bytes>) -> Self {
        Self { class, id, payload: payload.into() }
    }

    pub fn kind(&self) -> MessageKind {
        MessageKind::from_ids(self.class, self.id)
    }

    /// Size of this frame on the wire.
    pub fn wire_len(&self) -> usize {
        self.payload.len() + protocol::FRAME_OVERHEAD
    }

    /// Serialize back to wire format, recomputing the checksum.
    pub fn encode(&self) -> Vec<u8> {
        ChecksumValidator::encode_frame(self.class, self.id, &self.payload)
    }
}
