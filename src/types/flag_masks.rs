//! Masks for the packed flag bytes of a record payload
//!
//! Bit positions follow the device's navigation-solution layout. Multi-bit fields
//! are given as masks; [`BitField::field`](super::BitField::field) shifts them down.

// Validity flags (payload offset 11)
pub mod validity {
    pub const VALID_DATE: u8 = 0x01;
    pub const VALID_TIME: u8 = 0x02;
    pub const FULLY_RESOLVED: u8 = 0x04;
    pub const VALID_MAG_DECLINATION: u8 = 0x08;
}

// Fix status flags (payload offset 21)
pub mod fix_status {
    pub const VALID_FIX: u8 = 0x01;
    pub const DIFF_CORRECTIONS_APPLIED: u8 = 0x02;
    pub const POWER_STATE_MASK: u8 = 0x1C; // bits 4:2
    pub const VALID_HEADING: u8 = 0x20;
    pub const CARRIER_SOLUTION_MASK: u8 = 0xC0; // bits 7:6
}

// Date/time flags (payload offset 22)
pub mod date_time {
    pub const CONFIRMATION_AVAILABLE: u8 = 0x20;
    pub const CONFIRMED_DATE: u8 = 0x40;
    pub const CONFIRMED_TIME: u8 = 0x80;
}

// Lat/lon flags (payload offset 66)
pub mod lat_lon {
    pub const INVALID_LAT_LON: u8 = 0x01;
    pub const CORRECTION_AGE_MASK: u8 = 0x1E; // bits 4:1
}

// Battery / input voltage (payload offset 67)
pub mod battery {
    pub const LEVEL_MASK: u8 = 0x7F;
    pub const CHARGING: u8 = 0x80;
}
