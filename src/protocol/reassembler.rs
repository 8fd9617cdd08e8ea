//! Frame reassembly across arbitrary transport chunks.
//!
//! Chunk boundaries are unrelated to frame boundaries: a frame may span many
//! chunks and one chunk may hold several frames. The reassembler keeps a single
//! `BytesMut` buffer and extracts every complete frame after each push.
//!
//! Extraction loop:
//! 1. Fewer than 8 bytes buffered: wait.
//! 2. No sync marker at the head: resynchronise or wait, per [`ResyncPolicy`].
//! 3. Payload not fully buffered: wait.
//! 4. Bad checksum: drop the frame, count it, continue.
//! 5. Otherwise emit the frame and continue.
//!
//! # Example
//!
//! ```rust
//! use racebox::protocol::{ChecksumValidator, FrameReassembler};
//!
//! let bytes = ChecksumValidator::encode_frame(0xFF, 0x02, &[0xFF, 0x23]);
//! let mut reassembler = FrameReassembler::new();
//!
//! assert!(reassembler.feed(&bytes[..5]).is_empty());
//! let frames = reassembler.feed(&bytes[5..]);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(&frames[0].payload[..], &[0xFF, 0x23]);
//! ```

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{ChecksumValidator, FRAME_OVERHEAD, HEADER_LEN, SYNC};
use crate::types::RawFrame;

/// What to do when the buffer head is not a sync marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Discard bytes up to the next candidate sync byte and retry.
    #[default]
    SkipByte,
    /// Keep the misaligned bytes and stop extracting. The stream stays stalled
    /// until the buffer is cleared.
    Wait,
}

/// Reassembler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblerConfig {
    pub resync: ResyncPolicy,
    /// Frames announcing a longer payload are treated as a false sync match
    /// when resynchronising.
    pub max_payload_len: usize,
}

impl Default for ReassemblerConfig {
    fn default() -> Self {
        Self { resync: ResyncPolicy::SkipByte, max_payload_len: 1024 }
    }
}

/// Counters kept across the life of a reassembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblerStats {
    /// Frames that passed checksum validation.
    pub frames: u64,
    /// Frames dropped for a bad checksum.
    pub checksum_errors: u64,
    /// Bytes discarded while resynchronising.
    pub skipped_bytes: u64,
    /// Headers rejected for an implausible payload length.
    pub oversized_headers: u64,
}

/// Accumulates transport chunks and extracts validated frames.
#[derive(Debug)]
pub struct FrameReassembler {
    buffer: BytesMut,
    config: ReassemblerConfig,
    stats: ReassemblerStats,
    stalled: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::with_config(ReassemblerConfig::default())
    }

    pub fn with_config(config: ReassemblerConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            config,
            stats: ReassemblerStats::default(),
            stalled: false,
        }
    }

    /// Append a chunk and return every frame it completes, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    fn next_frame(&mut self) -> Option<RawFrame> {
        loop {
            if self.buffer.len() < FRAME_OVERHEAD {
                return None;
            }

            if self.buffer[..2] != SYNC {
                match self.config.resync {
                    ResyncPolicy::Wait => {
                        if !self.stalled {
                            warn!(
                                head = ?&self.buffer[..2],
                                buffered = self.buffer.len(),
                                "Sync marker missing, stream stalled"
                            );
                            self.stalled = true;
                        }
                        return None;
                    }
                    ResyncPolicy::SkipByte => {
                        self.skip_to_next_sync();
                        continue;
                    }
                }
            }

            let length = usize::from(u16::from_le_bytes([self.buffer[4], self.buffer[5]]));

            if length > self.config.max_payload_len && self.config.resync == ResyncPolicy::SkipByte
            {
                self.stats.oversized_headers += 1;
                debug!(length, max = self.config.max_payload_len, "Implausible length, resyncing");
                self.discard(1);
                continue;
            }

            let full_length = length + FRAME_OVERHEAD;
            if self.buffer.len() < full_length {
                return None;
            }

            let frame = self.buffer.split_to(full_length);
            let (class, id) = (frame[2], frame[3]);

            if let Err(error) = ChecksumValidator::verify(&frame) {
                self.stats.checksum_errors += 1;
                warn!(class, id, length, %error, "Dropping frame");
                continue;
            }

            self.stats.frames += 1;
            trace!(class, id, length, "Frame extracted");

            let payload = frame.freeze().slice(HEADER_LEN..HEADER_LEN + length);
            return Some(RawFrame { class, id, payload });
        }
    }

    /// Drop bytes up to the next `0xB5`, which is where a frame could begin.
    fn skip_to_next_sync(&mut self) {
        let skip = self.buffer[1..]
            .iter()
            .position(|&byte| byte == SYNC[0])
            .map_or(self.buffer.len(), |pos| pos + 1);

        trace!(skip, "Resyncing");
        self.discard(skip);
    }

    fn discard(&mut self, count: usize) {
        let _ = self.buffer.split_to(count);
        self.stats.skipped_bytes += count as u64;
    }

    /// Bytes waiting for the rest of a frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    pub fn config(&self) -> &ReassemblerConfig {
        &self.config
    }

    /// Whether extraction is blocked on a missing sync marker.
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Drop buffered bytes, e.g. after a reconnect.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.stalled = false;
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DOWNLOAD_COMMAND;
    use proptest::prelude::*;

    fn frame(id: u8, payload: &[u8]) -> Vec<u8> {
        ChecksumValidator::encode_frame(0xFF, id, payload)
    }

    #[test]
    fn waits_for_header() {
        let mut reassembler = FrameReassembler::new();
        assert!(reassembler.feed(&DOWNLOAD_COMMAND[..7]).is_empty());
        assert_eq!(reassembler.buffered_len(), 7);
        assert_eq!(reassembler.feed(&DOWNLOAD_COMMAND[7..]).len(), 1);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn waits_for_payload() {
        let bytes = frame(0x21, &[7u8; 80]);
        let mut reassembler = FrameReassembler::new();

        assert!(reassembler.feed(&bytes[..50]).is_empty());
        assert_eq!(reassembler.buffered_len(), 50);
        let frames = reassembler.feed(&bytes[50..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.len(), 80);
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let mut bytes = frame(0x23, &3u32.to_le_bytes());
        bytes.extend(frame(0x26, &[]));
        bytes.extend(frame(0x02, &[0xFF, 0x23]));

        let mut reassembler = FrameReassembler::new();
        let ids: Vec<u8> = reassembler.feed(&bytes).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![0x23, 0x26, 0x02]);
        assert_eq!(reassembler.stats().frames, 3);
    }

    #[test]
    fn corrupted_frame_does_not_block_the_next() {
        let mut bad = frame(0x21, &[1u8; 80]);
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        let good = frame(0x21, &[2u8; 80]);

        let mut reassembler = FrameReassembler::new();
        let mut bytes = bad;
        bytes.extend(&good);
        let frames = reassembler.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload[0], 2);
        assert_eq!(reassembler.stats().checksum_errors, 1);
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn skips_garbage_before_sync() {
        let mut bytes = vec![0x00, 0x13, 0xB5, 0x00, 0x62];
        bytes.extend(DOWNLOAD_COMMAND);

        let mut reassembler = FrameReassembler::new();
        let frames = reassembler.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(reassembler.stats().skipped_bytes, 5);
    }

    #[test]
    fn oversized_header_is_treated_as_false_sync() {
        // Looks like a header announcing 0xFFFF bytes
        let mut bytes = vec![0xB5, 0x62, 0xFF, 0x21, 0xFF, 0xFF];
        bytes.extend(DOWNLOAD_COMMAND);

        let mut reassembler = FrameReassembler::new();
        let frames = reassembler.feed(&bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(reassembler.stats().oversized_headers, 1);
    }

    #[test]
    fn wait_policy_stalls_on_misalignment() {
        let config = ReassemblerConfig { resync: ResyncPolicy::Wait, ..Default::default() };
        let mut reassembler = FrameReassembler::with_config(config);

        let mut bytes = vec![0x00];
        bytes.extend(DOWNLOAD_COMMAND);
        assert!(reassembler.feed(&bytes).is_empty());
        assert!(reassembler.is_stalled());
        assert!(reassembler.feed(&DOWNLOAD_COMMAND).is_empty());

        reassembler.clear();
        assert!(!reassembler.is_stalled());
        assert_eq!(reassembler.feed(&DOWNLOAD_COMMAND).len(), 1);
    }

    fn arb_stream() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            (any::<u8>(), prop::collection::vec(any::<u8>(), 0..120)),
            1..12,
        )
        .prop_map(|frames| {
            frames.into_iter().flat_map(|(id, payload)| frame(id, &payload)).collect()
        })
    }

    proptest! {
        #[test]
        fn prop_chunking_invariance(
            stream in arb_stream(),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
        ) {
            let whole = FrameReassembler::new().feed(&stream);

            let mut offsets: Vec<usize> = cuts.iter().map(|c| c.index(stream.len() + 1)).collect();
            offsets.push(0);
            offsets.push(stream.len());
            offsets.sort_unstable();
            offsets.dedup();

            let mut reassembler = FrameReassembler::new();
            let mut chunked = Vec::new();
            for window in offsets.windows(2) {
                chunked.extend(reassembler.feed(&stream[window[0]..window[1]]));
            }

            prop_assert_eq!(&chunked, &whole);
            prop_assert_eq!(reassembler.buffered_len(), 0);
        }

        #[test]
        fn prop_garbage_never_panics(noise in prop::collection::vec(any::<u8>(), 0..512)) {
            let mut reassembler = FrameReassembler::new();
            let _ = reassembler.feed(&noise);
            let frames = reassembler.feed(&DOWNLOAD_COMMAND);
            // The trailing command is recovered unless the noise ends in a
            // partial header that swallows it.
            prop_assert!(frames.len() <= 2);
        }
    }
}
