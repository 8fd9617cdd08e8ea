//! Telemetry record layout and decoded record variants
//!
//! Every record-carrying message has the same 80-byte little-endian payload:
//!
//! ```text
//! offset  type  field                offset  type  field
//!      0  u32   iTOW (ms)                36  i32   MSL altitude (mm)
//!      4  u16   year                     40  u32   horizontal accuracy (mm)
//!      6  u8    month                    44  u32   vertical accuracy (mm)
//!      7  u8    day                      48  i32   speed (mm/s)
//!      8  u8    hour                     52  i32   heading (1e-5 deg)
//!      9  u8    minute                   56  u32   speed accuracy (mm/s)
//!     10  u8    second                   60  u32   heading accuracy (1e-5 deg)
//!     11  u8    validity flags           64  u16   PDOP (0.01)
//!     12  u32   time accuracy (ns)       66  u8    lat/lon flags
//!     16  i32   nanoseconds              67  u8    battery / input voltage
//!     20  u8    fix status               68  i16   g-force X,Y,Z (milli-g)
//!     21  u8    fix status flags         74  i16   rotation rate X,Y,Z (0.01 deg/s)
//!     22  u8    date/time flags
//!     23  u8    number of SVs
//!     24  i32   longitude (1e-7 deg)
//!     28  i32   latitude (1e-7 deg)
//!     32  i32   WGS altitude (mm)
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::SchemaVariant;
use super::flags::{
    BatteryStatus, DateTimeFlags, FixStatus, FixStatusFlags, LatLonFlags, ValidityFlags,
};
use crate::{Result, TelemetryError};

/// Size of a record payload in bytes.
pub const RECORD_PAYLOAD_LEN: usize = 80;

pub(crate) const DEGREES_SCALE: f64 = 1e-7;
pub(crate) const MILLI_SCALE: f64 = 1e-3;
pub(crate) const HEADING_SCALE: f64 = 1e-5;
pub(crate) const PDOP_SCALE: f64 = 1e-2;
pub(crate) const ROTATION_SCALE: f64 = 1e-2;

fn le_u16(p: &[u8], o: usize) -> u16 {
    u16::from_le_bytes([p[o], p[o + 1]])
}

fn le_i16(p: &[u8], o: usize) -> i16 {
    i16::from_le_bytes([p[o], p[o + 1]])
}

fn le_u32(p: &[u8], o: usize) -> u32 {
    u32::from_le_bytes([p[o], p[o + 1], p[o + 2], p[o + 3]])
}

fn le_i32(p: &[u8], o: usize) -> i32 {
    i32::from_le_bytes([p[o], p[o + 1], p[o + 2], p[o + 3]])
}

/// Undecoded integer fields of a record payload, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub itow: u32,
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub validity_flags: u8,
    pub time_accuracy: u32,
    pub nanoseconds: i32,
    pub fix_status: u8,
    pub fix_status_flags: u8,
    pub date_time_flags: u8,
    pub num_svs: u8,
    pub longitude: i32,
    pub latitude: i32,
    pub wgs_altitude: i32,
    pub msl_altitude: i32,
    pub horizontal_accuracy: u32,
    pub vertical_accuracy: u32,
    pub speed: i32,
    pub heading: i32,
    pub speed_accuracy: u32,
    pub heading_accuracy: u32,
    pub pdop: u16,
    pub lat_lon_flags: u8,
    pub battery: u8,
    pub g_force: [i16; 3],
    pub rotation_rate: [i16; 3],
}

impl RawRecord {
    /// Parse the fixed layout from the first 80 bytes of `payload`.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < RECORD_PAYLOAD_LEN {
            return Err(TelemetryError::PayloadLength {
                context: "record",
                expected: RECORD_PAYLOAD_LEN,
                actual: payload.len(),
            });
        }
        let p = payload;

        Ok(Self {
            itow: le_u32(p, 0),
            year: le_u16(p, 4),
            month: p[6],
            day: p[7],
            hour: p[8],
            minute: p[9],
            second: p[10],
            validity_flags: p[11],
            time_accuracy: le_u32(p, 12),
            nanoseconds: le_i32(p, 16),
            fix_status: p[20],
            fix_status_flags: p[21],
            date_time_flags: p[22],
            num_svs: p[23],
            longitude: le_i32(p, 24),
            latitude: le_i32(p, 28),
            wgs_altitude: le_i32(p, 32),
            msl_altitude: le_i32(p, 36),
            horizontal_accuracy: le_u32(p, 40),
            vertical_accuracy: le_u32(p, 44),
            speed: le_i32(p, 48),
            heading: le_i32(p, 52),
            speed_accuracy: le_u32(p, 56),
            heading_accuracy: le_u32(p, 60),
            pdop: le_u16(p, 64),
            lat_lon_flags: p[66],
            battery: p[67],
            g_force: [le_i16(p, 68), le_i16(p, 70), le_i16(p, 72)],
            rotation_rate: [le_i16(p, 74), le_i16(p, 76), le_i16(p, 78)],
        })
    }

    /// Serialize to the 80-byte wire layout.
    pub fn to_bytes(&self) -> [u8; RECORD_PAYLOAD_LEN] {
        let mut p = [0u8; RECORD_PAYLOAD_LEN];
        p[0..4].copy_from_slice(&self.itow.to_le_bytes());
        p[4..6].copy_from_slice(&self.year.to_le_bytes());
        p[6] = self.month;
        p[7] = self.day;
        p[8] = self.hour;
        p[9] = self.minute;
        p[10] = self.second;
        p[11] = self.validity_flags;
        p[12..16].copy_from_slice(&self.time_accuracy.to_le_bytes());
        p[16..20].copy_from_slice(&self.nanoseconds.to_le_bytes());
        p[20] = self.fix_status;
        p[21] = self.fix_status_flags;
        p[22] = self.date_time_flags;
        p[23] = self.num_svs;
        p[24..28].copy_from_slice(&self.longitude.to_le_bytes());
        p[28..32].copy_from_slice(&self.latitude.to_le_bytes());
        p[32..36].copy_from_slice(&self.wgs_altitude.to_le_bytes());
        p[36..40].copy_from_slice(&self.msl_altitude.to_le_bytes());
        p[40..44].copy_from_slice(&self.horizontal_accuracy.to_le_bytes());
        p[44..48].copy_from_slice(&self.vertical_accuracy.to_le_bytes());
        p[48..52].copy_from_slice(&self.speed.to_le_bytes());
        p[52..56].copy_from_slice(&self.heading.to_le_bytes());
        p[56..60].copy_from_slice(&self.speed_accuracy.to_le_bytes());
        p[60..64].copy_from_slice(&self.heading_accuracy.to_le_bytes());
        p[64..66].copy_from_slice(&self.pdop.to_le_bytes());
        p[66] = self.lat_lon_flags;
        p[67] = self.battery;
        for (axis, value) in self.g_force.iter().enumerate() {
            let o = 68 + axis * 2;
            p[o..o + 2].copy_from_slice(&value.to_le_bytes());
        }
        for (axis, value) in self.rotation_rate.iter().enumerate() {
            let o = 74 + axis * 2;
            p[o..o + 2].copy_from_slice(&value.to_le_bytes());
        }
        p
    }

    pub fn timestamp(&self) -> Timestamp {
        Timestamp {
            year: self.year,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        }
    }
}

/// Device UTC calendar time, to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// `YYYYMMDDhhmmss`
    pub fn compact(&self) -> String {
        format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    /// `None` when the fields do not form a calendar time (e.g. before the
    /// receiver resolved the date).
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), u32::from(self.day))?
            .and_hms_opt(u32::from(self.hour), u32::from(self.minute), u32::from(self.second))
    }
}

/// Three-axis IMU reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    fn scaled(raw: [i16; 3], scale: f64) -> Self {
        Self {
            x: f64::from(raw[0]) * scale,
            y: f64::from(raw[1]) * scale,
            z: f64::from(raw[2]) * scale,
        }
    }
}

/// Fields exposed by the simple schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleRecord {
    /// Milliseconds since the start of the GPS week.
    pub itow: u32,
    pub timestamp: Timestamp,
    /// Degrees.
    pub longitude: f64,
    /// Degrees.
    pub latitude: f64,
    /// Metres above the WGS84 ellipsoid.
    pub wgs_altitude: f64,
    /// Metres per second.
    pub speed: f64,
    /// Degrees.
    pub heading: f64,
    /// g.
    pub g_force: Axes,
    /// Degrees per second.
    pub rotation_rate: Axes,
}

impl SimpleRecord {
    pub fn from_raw(raw: &RawRecord) -> Self {
        Self {
            itow: raw.itow,
            timestamp: raw.timestamp(),
            longitude: f64::from(raw.longitude) * DEGREES_SCALE,
            latitude: f64::from(raw.latitude) * DEGREES_SCALE,
            wgs_altitude: f64::from(raw.wgs_altitude) * MILLI_SCALE,
            speed: f64::from(raw.speed) * MILLI_SCALE,
            heading: f64::from(raw.heading) * HEADING_SCALE,
            g_force: Axes::scaled(raw.g_force, MILLI_SCALE),
            rotation_rate: Axes::scaled(raw.rotation_rate, ROTATION_SCALE),
        }
    }

    fn push_row(&self, row: &mut Vec<String>) {
        let ts = &self.timestamp;
        row.extend([
            self.itow.to_string(),
            ts.year.to_string(),
            ts.month.to_string(),
            ts.day.to_string(),
            ts.hour.to_string(),
            ts.minute.to_string(),
            ts.second.to_string(),
            self.longitude.to_string(),
            self.latitude.to_string(),
            self.wgs_altitude.to_string(),
            self.speed.to_string(),
            self.heading.to_string(),
            self.g_force.x.to_string(),
            self.g_force.y.to_string(),
            self.g_force.z.to_string(),
            self.rotation_rate.x.to_string(),
            self.rotation_rate.y.to_string(),
            self.rotation_rate.z.to_string(),
        ]);
    }
}

/// Simple fields plus accuracy, flag and power fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedRecord {
    pub core: SimpleRecord,
    pub validity: ValidityFlags,
    /// Nanoseconds.
    pub time_accuracy: u32,
    /// Fraction of the second, nanoseconds (may be negative).
    pub nanoseconds: i32,
    pub fix_status: FixStatus,
    pub fix_status_flags: FixStatusFlags,
    pub date_time_flags: DateTimeFlags,
    pub num_svs: u8,
    /// Metres above mean sea level.
    pub msl_altitude: f64,
    /// Metres.
    pub horizontal_accuracy: f64,
    /// Metres.
    pub vertical_accuracy: f64,
    /// Metres per second.
    pub speed_accuracy: f64,
    /// Degrees.
    pub heading_accuracy: f64,
    pub pdop: f64,
    pub lat_lon_flags: LatLonFlags,
    pub battery: BatteryStatus,
}

/// A decoded record, tagged by the schema it was decoded with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryRecord {
    Simple(SimpleRecord),
    Extended(ExtendedRecord),
}

impl TelemetryRecord {
    /// Fields common to both variants.
    pub fn core(&self) -> &SimpleRecord {
        match self {
            TelemetryRecord::Simple(record) => record,
            TelemetryRecord::Extended(record) => &record.core,
        }
    }

    pub fn variant(&self) -> SchemaVariant {
        match self {
            TelemetryRecord::Simple(_) => SchemaVariant::Simple,
            TelemetryRecord::Extended(_) => SchemaVariant::Extended,
        }
    }

    pub fn itow(&self) -> u32 {
        self.core().itow
    }

    pub fn timestamp(&self) -> Timestamp {
        self.core().timestamp
    }

    pub fn extended(&self) -> Option<&ExtendedRecord> {
        match self {
            TelemetryRecord::Extended(record) => Some(record),
            TelemetryRecord::Simple(_) => None,
        }
    }

    /// Column values in [`SchemaVariant::columns`] order.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(self.variant().column_count());
        self.core().push_row(&mut row);

        if let TelemetryRecord::Extended(ext) = self {
            row.extend([
                ext.validity.raw.value().to_string(),
                ext.time_accuracy.to_string(),
                ext.nanoseconds.to_string(),
                ext.fix_status.raw().to_string(),
                ext.fix_status_flags.raw.value().to_string(),
                ext.date_time_flags.raw.value().to_string(),
                ext.num_svs.to_string(),
                ext.msl_altitude.to_string(),
                ext.horizontal_accuracy.to_string(),
                ext.vertical_accuracy.to_string(),
                ext.speed_accuracy.to_string(),
                ext.heading_accuracy.to_string(),
                ext.pdop.to_string(),
                ext.lat_lon_flags.raw.value().to_string(),
                ext.battery.column_value().to_string(),
            ]);
        }

        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawRecord {
        RawRecord {
            itow: 118_286_000,
            year: 2024,
            month: 9,
            day: 14,
            hour: 8,
            minute: 51,
            second: 26,
            validity_flags: 0x07,
            time_accuracy: 25,
            nanoseconds: -12_345,
            fix_status: 3,
            fix_status_flags: 0x01,
            date_time_flags: 0xE0,
            num_svs: 11,
            longitude: 123_456_789,
            latitude: -336_543_210,
            wgs_altitude: 152_345,
            msl_altitude: 140_001,
            horizontal_accuracy: 1_250,
            vertical_accuracy: 2_100,
            speed: 27_780,
            heading: 9_012_345,
            speed_accuracy: 150,
            heading_accuracy: 210_000,
            pdop: 145,
            lat_lon_flags: 0,
            battery: 0x80 | 88,
            g_force: [-12, 981, 1_003],
            rotation_rate: [150, -275, 3],
        }
    }

    #[test]
    fn parse_reads_every_offset() {
        let raw = sample_raw();
        assert_eq!(RawRecord::parse(&raw.to_bytes()).unwrap(), raw);
    }

    #[test]
    fn parse_rejects_short_payload() {
        let err = RawRecord::parse(&[0u8; 79]).unwrap_err();
        assert!(matches!(err, TelemetryError::PayloadLength { expected: 80, actual: 79, .. }));
    }

    #[test]
    fn parse_ignores_trailing_bytes() {
        let raw = sample_raw();
        let mut payload = raw.to_bytes().to_vec();
        payload.extend_from_slice(&[0xAA; 4]);
        assert_eq!(RawRecord::parse(&payload).unwrap(), raw);
    }

    #[test]
    fn simple_scaling() {
        let record = SimpleRecord::from_raw(&sample_raw());
        assert!((record.longitude - 12.3456789).abs() < 1e-9);
        assert!((record.latitude + 33.654321).abs() < 1e-9);
        assert!((record.wgs_altitude - 152.345).abs() < 1e-9);
        assert!((record.speed - 27.78).abs() < 1e-9);
        assert!((record.heading - 90.12345).abs() < 1e-9);
        assert!((record.g_force.y - 0.981).abs() < 1e-9);
        assert!((record.rotation_rate.y + 2.75).abs() < 1e-9);
    }

    #[test]
    fn timestamp_formats() {
        let ts = sample_raw().timestamp();
        assert_eq!(ts.compact(), "20240914085126");
        assert!(ts.to_datetime().is_some());

        let unresolved = Timestamp { year: 0, month: 0, day: 0, hour: 0, minute: 0, second: 0 };
        assert_eq!(unresolved.compact(), "00000000000000");
        assert!(unresolved.to_datetime().is_none());
    }

    #[test]
    fn simple_row_matches_columns() {
        let record = TelemetryRecord::Simple(SimpleRecord::from_raw(&sample_raw()));
        let row = record.to_row();
        assert_eq!(row.len(), SchemaVariant::Simple.column_count());
        assert_eq!(row[0], "118286000");
        assert_eq!(row[1], "2024");
    }
}
