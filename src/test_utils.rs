//! Synthetic frame and record builders for tests and benchmarks
//!
//! Every builder produces bytes exactly as the device would put them on the
//! wire, so tests can exercise the full reassembly path.

#![cfg(any(test, feature = "benchmark"))]

use crate::protocol::{CLASS_RACEBOX, ChecksumValidator, message_id};
use crate::types::RawRecord;

/// Builder for [`RawRecord`] values with a plausible 3D fix by default.
#[derive(Debug, Clone)]
pub struct RawRecordBuilder {
    raw: RawRecord,
}

impl RawRecordBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawRecord {
                itow: 0,
                year: 2024,
                month: 1,
                day: 1,
                hour: 12,
                minute: 0,
                second: 0,
                validity_flags: 0x07,
                time_accuracy: 20,
                fix_status: 3,
                fix_status_flags: 0x01,
                date_time_flags: 0xE0,
                num_svs: 12,
                longitude: 123_456_789,
                latitude: 476_543_210,
                wgs_altitude: 250_000,
                msl_altitude: 201_000,
                horizontal_accuracy: 900,
                vertical_accuracy: 1_500,
                pdop: 120,
                battery: 90,
                g_force: [0, 0, 1_000],
                ..Default::default()
            },
        }
    }

    pub fn itow(mut self, itow: u32) -> Self {
        self.raw.itow = itow;
        self
    }

    pub fn time(mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        self.raw.year = year;
        self.raw.month = month;
        self.raw.day = day;
        self.raw.hour = hour;
        self.raw.minute = minute;
        self.raw.second = second;
        self
    }

    /// Position in 1e-7 degrees.
    pub fn position(mut self, longitude: i32, latitude: i32) -> Self {
        self.raw.longitude = longitude;
        self.raw.latitude = latitude;
        self
    }

    /// Speed in mm/s and heading in 1e-5 degrees.
    pub fn motion(mut self, speed: i32, heading: i32) -> Self {
        self.raw.speed = speed;
        self.raw.heading = heading;
        self
    }

    pub fn fix_status(mut self, fix_status: u8) -> Self {
        self.raw.fix_status = fix_status;
        self
    }

    pub fn battery(mut self, battery: u8) -> Self {
        self.raw.battery = battery;
        self
    }

    pub fn build(self) -> RawRecord {
        self.raw
    }
}

impl Default for RawRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a device-class frame.
pub fn encode_frame(id: u8, payload: &[u8]) -> Vec<u8> {
    ChecksumValidator::encode_frame(CLASS_RACEBOX, id, payload)
}

pub fn history_frame(record: &RawRecord) -> Vec<u8> {
    encode_frame(message_id::HISTORY_DATA, &record.to_bytes())
}

pub fn live_frame(record: &RawRecord) -> Vec<u8> {
    encode_frame(message_id::LIVE_DATA, &record.to_bytes())
}

/// Download start announcing `count` records.
pub fn start_frame(count: u32) -> Vec<u8> {
    encode_frame(message_id::DOWNLOAD_START, &count.to_le_bytes())
}

/// Ack for the download command, which ends the download.
pub fn ack_frame() -> Vec<u8> {
    encode_frame(message_id::ACK, &[CLASS_RACEBOX, message_id::DOWNLOAD_START])
}

pub fn nack_frame() -> Vec<u8> {
    encode_frame(message_id::NACK, &[CLASS_RACEBOX, message_id::DOWNLOAD_START])
}

/// Standalone recording state change.
pub fn boundary_frame() -> Vec<u8> {
    encode_frame(message_id::RECORDING_STATE, &[0x00])
}

/// A complete download stream: start, then each session's records separated
/// by boundary frames, then the ack.
pub fn download_capture(session_sizes: &[usize]) -> Vec<u8> {
    let total: usize = session_sizes.iter().sum();
    let mut bytes = start_frame(u32::try_from(total).unwrap_or(u32::MAX));
    let mut itow = 0u32;

    for (index, &size) in session_sizes.iter().enumerate() {
        if index > 0 {
            bytes.extend(boundary_frame());
        }
        for _ in 0..size {
            let second = u8::try_from((itow / 1000) % 60).unwrap_or(0);
            let record = RawRecordBuilder::new()
                .itow(itow)
                .time(2024, 1, 1, 12, 0, second)
                .motion(20_000 + (itow % 5_000) as i32, 9_000_000)
                .build();
            bytes.extend(history_frame(&record));
            itow += 40;
        }
    }

    bytes.extend(ack_frame());
    bytes
}
