//! Decoded views of the packed flag bytes carried by extended records

use serde::{Deserialize, Serialize};

use super::BitField;
use super::flag_masks::{battery, date_time, fix_status, lat_lon, validity};

/// Navigation fix type reported by the positioning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixStatus {
    NoFix,
    Fix2D,
    Fix3D,
    Unknown(u8),
}

impl FixStatus {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => FixStatus::NoFix,
            2 => FixStatus::Fix2D,
            3 => FixStatus::Fix3D,
            other => FixStatus::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            FixStatus::NoFix => 0,
            FixStatus::Fix2D => 2,
            FixStatus::Fix3D => 3,
            FixStatus::Unknown(other) => other,
        }
    }
}

/// Validity byte: which parts of the timestamp can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityFlags {
    pub valid_date: bool,
    pub valid_time: bool,
    pub fully_resolved: bool,
    pub valid_magnetic_declination: bool,
    pub raw: BitField,
}

impl ValidityFlags {
    pub fn decode(raw: u8) -> Self {
        let bits = BitField::new(raw);
        Self {
            valid_date: bits.has_flag(validity::VALID_DATE),
            valid_time: bits.has_flag(validity::VALID_TIME),
            fully_resolved: bits.has_flag(validity::FULLY_RESOLVED),
            valid_magnetic_declination: bits.has_flag(validity::VALID_MAG_DECLINATION),
            raw: bits,
        }
    }
}

/// Power-save state of the receiver (fix status bits 4:2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    NotActive,
    Enabled,
    Acquisition,
    Tracking,
    PowerOptimizedTracking,
    Inactive,
    Unknown(u8),
}

impl PowerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => PowerState::NotActive,
            1 => PowerState::Enabled,
            2 => PowerState::Acquisition,
            3 => PowerState::Tracking,
            4 => PowerState::PowerOptimizedTracking,
            5 => PowerState::Inactive,
            other => PowerState::Unknown(other),
        }
    }
}

/// Carrier-phase range solution (fix status bits 7:6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarrierSolution {
    None,
    Float,
    Fixed,
    Unknown(u8),
}

impl CarrierSolution {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => CarrierSolution::None,
            1 => CarrierSolution::Float,
            2 => CarrierSolution::Fixed,
            other => CarrierSolution::Unknown(other),
        }
    }
}

/// Fix status flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixStatusFlags {
    pub valid_fix: bool,
    pub differential_corrections_applied: bool,
    pub power_state: PowerState,
    pub valid_heading: bool,
    pub carrier_solution: CarrierSolution,
    pub raw: BitField,
}

impl FixStatusFlags {
    pub fn decode(raw: u8) -> Self {
        let bits = BitField::new(raw);
        Self {
            valid_fix: bits.has_flag(fix_status::VALID_FIX),
            differential_corrections_applied: bits.has_flag(fix_status::DIFF_CORRECTIONS_APPLIED),
            power_state: PowerState::from_raw(bits.field(fix_status::POWER_STATE_MASK)),
            valid_heading: bits.has_flag(fix_status::VALID_HEADING),
            carrier_solution: CarrierSolution::from_raw(
                bits.field(fix_status::CARRIER_SOLUTION_MASK),
            ),
            raw: bits,
        }
    }
}

/// Date/time confirmation flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTimeFlags {
    pub confirmation_available: bool,
    pub confirmed_utc_date: bool,
    pub confirmed_utc_time: bool,
    pub raw: BitField,
}

impl DateTimeFlags {
    pub fn decode(raw: u8) -> Self {
        let bits = BitField::new(raw);
        Self {
            confirmation_available: bits.has_flag(date_time::CONFIRMATION_AVAILABLE),
            confirmed_utc_date: bits.has_flag(date_time::CONFIRMED_DATE),
            confirmed_utc_time: bits.has_flag(date_time::CONFIRMED_TIME),
            raw: bits,
        }
    }
}

/// Lat/lon flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatLonFlags {
    pub invalid_lat_lon: bool,
    /// Age bucket of the differential corrections (0 = not available).
    pub differential_correction_age: u8,
    pub raw: BitField,
}

impl LatLonFlags {
    pub fn decode(raw: u8) -> Self {
        let bits = BitField::new(raw);
        Self {
            invalid_lat_lon: bits.has_flag(lat_lon::INVALID_LAT_LON),
            differential_correction_age: bits.field(lat_lon::CORRECTION_AGE_MASK),
            raw: bits,
        }
    }
}

/// How the device reports power in the battery/voltage byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryEncoding {
    /// Battery-powered units: low 7 bits are a percentage, bit 7 flags charging.
    #[default]
    ChargeLevel,
    /// Externally powered units: the whole byte is input voltage in 0.1 V.
    InputVoltage,
}

/// Decoded battery/voltage byte.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BatteryStatus {
    ChargeLevel { percent: u8, charging: bool },
    InputVoltage { volts: f64 },
}

impl BatteryStatus {
    pub fn decode(raw: u8, encoding: BatteryEncoding) -> Self {
        let bits = BitField::new(raw);
        match encoding {
            BatteryEncoding::ChargeLevel => BatteryStatus::ChargeLevel {
                percent: bits.field(battery::LEVEL_MASK),
                charging: bits.has_flag(battery::CHARGING),
            },
            BatteryEncoding::InputVoltage => {
                BatteryStatus::InputVoltage { volts: f64::from(raw) / 10.0 }
            }
        }
    }

    /// Value for the "Battery/Input Voltage" column.
    ///
    /// Charge levels are written as the device byte so the charging bit survives.
    pub fn column_value(&self) -> f64 {
        match self {
            BatteryStatus::ChargeLevel { percent, charging } => {
                let flag = if *charging { battery::CHARGING } else { 0 };
                f64::from((percent & battery::LEVEL_MASK) | flag)
            }
            BatteryStatus::InputVoltage { volts } => *volts,
        }
    }
}
