//! Record payload decoding, parameterised by schema variant

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::record::{HEADING_SCALE, MILLI_SCALE, PDOP_SCALE};
use crate::types::{
    BatteryEncoding, BatteryStatus, DateTimeFlags, ExtendedRecord, FixStatus, FixStatusFlags,
    LatLonFlags, RECORD_PAYLOAD_LEN, RawRecord, SchemaVariant, SimpleRecord, TelemetryRecord,
    ValidityFlags,
};
use crate::{Result, TelemetryError};

/// What to do with records whose fix status is "no fix".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixPolicy {
    /// Decode them like any other record.
    #[default]
    Keep,
    /// Drop them without reporting an error.
    Suppress,
    /// Report [`TelemetryError::NoFix`].
    Reject,
}

/// Decoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub variant: SchemaVariant,
    pub battery_encoding: BatteryEncoding,
    pub fix_policy: FixPolicy,
}

/// Decodes 80-byte record payloads into [`TelemetryRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordDecoder {
    config: DecoderConfig,
}

impl RecordDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn variant(&self) -> SchemaVariant {
        self.config.variant
    }

    /// Decode one payload.
    ///
    /// Returns `Ok(None)` when the record is suppressed by [`FixPolicy::Suppress`].
    pub fn decode(&self, payload: &[u8]) -> Result<Option<TelemetryRecord>> {
        let raw = RawRecord::parse(payload)?;
        if payload.len() > RECORD_PAYLOAD_LEN {
            trace!(len = payload.len(), "Ignoring trailing record bytes");
        }

        if raw.fix_status == 0 {
            match self.config.fix_policy {
                FixPolicy::Keep => {}
                FixPolicy::Suppress => {
                    trace!(itow = raw.itow, "Suppressing record without fix");
                    return Ok(None);
                }
                FixPolicy::Reject => return Err(TelemetryError::NoFix { itow: raw.itow }),
            }
        }

        Ok(Some(self.decode_raw(&raw)))
    }

    /// Apply scaling and flag decomposition to already parsed fields.
    pub fn decode_raw(&self, raw: &RawRecord) -> TelemetryRecord {
        let core = SimpleRecord::from_raw(raw);

        match self.config.variant {
            SchemaVariant::Simple => TelemetryRecord::Simple(core),
            SchemaVariant::Extended => TelemetryRecord::Extended(ExtendedRecord {
                core,
                validity: ValidityFlags::decode(raw.validity_flags),
                time_accuracy: raw.time_accuracy,
                nanoseconds: raw.nanoseconds,
                fix_status: FixStatus::from_raw(raw.fix_status),
                fix_status_flags: FixStatusFlags::decode(raw.fix_status_flags),
                date_time_flags: DateTimeFlags::decode(raw.date_time_flags),
                num_svs: raw.num_svs,
                msl_altitude: f64::from(raw.msl_altitude) * MILLI_SCALE,
                horizontal_accuracy: f64::from(raw.horizontal_accuracy) * MILLI_SCALE,
                vertical_accuracy: f64::from(raw.vertical_accuracy) * MILLI_SCALE,
                speed_accuracy: f64::from(raw.speed_accuracy) * MILLI_SCALE,
                heading_accuracy: f64::from(raw.heading_accuracy) * HEADING_SCALE,
                pdop: f64::from(raw.pdop) * PDOP_SCALE,
                lat_lon_flags: LatLonFlags::decode(raw.lat_lon_flags),
                battery: BatteryStatus::decode(raw.battery, self.config.battery_encoding),
            }),
        }
    }
}
