//! Core types for decoded telemetry.
//!
//! - [`RawFrame`] is a checksum-validated wire frame with the header stripped
//! - [`RawRecord`] holds the integer fields of an 80-byte record payload in wire order
//! - [`TelemetryRecord`] is a decoded record, tagged by its [`SchemaVariant`]
//! - [`BitField`] and the [`flags`] types decompose the packed flag bytes
//!
//! ## Usage Example
//!
//! ```rust
//! use racebox::types::{RawRecord, SimpleRecord};
//!
//! let raw = RawRecord { longitude: 123_456_789, latitude: 499_876_543, ..Default::default() };
//! let parsed = RawRecord::parse(&raw.to_bytes()).unwrap();
//! let record = SimpleRecord::from_raw(&parsed);
//! assert!((record.longitude - 12.3456789).abs() < 1e-9);
//! ```

mod bitfield;
pub mod flag_masks;
pub mod flags;
mod frame;
pub(crate) mod record;
mod schema;
mod update_rate;

pub use bitfield::BitField;
pub use flags::{
    BatteryEncoding, BatteryStatus, CarrierSolution, DateTimeFlags, FixStatus, FixStatusFlags,
    LatLonFlags, PowerState, ValidityFlags,
};
pub use frame::{MessageKind, RawFrame};
pub use record::{
    Axes, ExtendedRecord, RECORD_PAYLOAD_LEN, RawRecord, SimpleRecord, TelemetryRecord, Timestamp,
};
pub use schema::{EXTENDED_EXTRA_COLUMNS, SIMPLE_COLUMNS, SchemaVariant};
pub use update_rate::{DEVICE_RATE_HZ, UpdateRate};
