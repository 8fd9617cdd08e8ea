//! Two-accumulator frame checksum
//!
//! Not a CRC: an 8-bit running sum `ck_a` and a sum of sums `ck_b`, both mod 256,
//! over class, id, length and payload.

use super::{FRAME_OVERHEAD, SYNC};
use crate::{Result, TelemetryError};

/// Computes and verifies frame checksums.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumValidator;

impl ChecksumValidator {
    /// Checksum over `data` (class through end of payload).
    pub fn compute(data: &[u8]) -> [u8; 2] {
        let mut ck_a: u8 = 0;
        let mut ck_b: u8 = 0;

        for &byte in data {
            ck_a = ck_a.wrapping_add(byte);
            ck_b = ck_b.wrapping_add(ck_a);
        }

        [ck_a, ck_b]
    }

    /// Check the trailer of a complete frame (sync through checksum).
    pub fn verify(frame: &[u8]) -> Result<()> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(TelemetryError::PayloadLength {
                context: "frame",
                expected: FRAME_OVERHEAD,
                actual: frame.len(),
            });
        }

        let end = frame.len() - 2;
        let expected = Self::compute(&frame[2..end]);
        let found = [frame[end], frame[end + 1]];

        if expected == found {
            Ok(())
        } else {
            Err(TelemetryError::ChecksumMismatch { expected, found })
        }
    }

    pub fn is_valid(frame: &[u8]) -> bool {
        Self::verify(frame).is_ok()
    }

    /// Build a complete frame with sync, header and checksum.
    ///
    /// Payloads longer than `u16::MAX` are truncated to fit the length field.
    pub fn encode_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
        let payload = &payload[..payload.len().min(usize::from(u16::MAX))];
        let length = payload.len() as u16;

        let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
        frame.extend_from_slice(&SYNC);
        frame.push(class);
        frame.push(id);
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(payload);

        let checksum = Self::compute(&frame[2..]);
        frame.extend_from_slice(&checksum);
        frame
    }
}
