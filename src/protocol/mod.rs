//! Wire protocol: framing, checksums, record decoding and message routing.
//!
//! ## Frame layout
//!
//! ```text
//! B5 62 | class:u8 | id:u8 | length:u16le | payload[length] | ck_a:u8 | ck_b:u8
//! ```
//!
//! Data flows one way through this module:
//!
//! ```text
//! transport chunk -> FrameReassembler -> RawFrame -> MessageDispatcher
//!                                                    -> RecordDecoder -> SessionAccumulator
//! ```
//!
//! [`Pipeline`] wires the stages together for a single delivery context.

mod checksum;
mod decoder;
mod dispatcher;
mod pipeline;
mod reassembler;

pub use checksum::ChecksumValidator;
pub use decoder::{DecoderConfig, FixPolicy, RecordDecoder};
pub use dispatcher::{DispatchOutcome, DispatchStats, DownloadState, MessageDispatcher};
pub use pipeline::Pipeline;
pub use reassembler::{FrameReassembler, ReassemblerConfig, ReassemblerStats, ResyncPolicy};

/// Frame sync marker.
pub const SYNC: [u8; 2] = [0xB5, 0x62];

/// Bytes before the payload: sync, class, id, length.
pub const HEADER_LEN: usize = 6;

/// Header plus checksum trailer.
pub const FRAME_OVERHEAD: usize = 8;

/// Message class used by every device-specific message.
pub const CLASS_RACEBOX: u8 = 0xFF;

/// Message ids within [`CLASS_RACEBOX`].
pub mod message_id {
    pub const LIVE_DATA: u8 = 0x01;
    pub const ACK: u8 = 0x02;
    pub const NACK: u8 = 0x03;
    pub const HISTORY_DATA: u8 = 0x21;
    pub const DOWNLOAD_START: u8 = 0x23;
    pub const RECORDING_STATE: u8 = 0x26;
}

/// Request a history download: class 0xFF, id 0x23, empty body.
pub const DOWNLOAD_COMMAND: [u8; 8] = [0xB5, 0x62, 0xFF, 0x23, 0x00, 0x00, 0x22, 0x65];
