//! Record schema variants and their column sets

use serde::{Deserialize, Serialize};

/// Column names shared by both variants, in output order.
pub const SIMPLE_COLUMNS: [&str; 18] = [
    "iTOW",
    "Year",
    "Month",
    "Day",
    "Hour",
    "Minute",
    "Second",
    "Longitude",
    "Latitude",
    "WGS Altitude",
    "Speed",
    "Heading",
    "G-Force X",
    "G-Force Y",
    "G-Force Z",
    "Rotation rate X",
    "Rotation rate Y",
    "Rotation rate Z",
];

/// Columns the extended variant appends after [`SIMPLE_COLUMNS`].
pub const EXTENDED_EXTRA_COLUMNS: [&str; 15] = [
    "Validity Flags",
    "Time Accuracy",
    "Nanoseconds",
    "Fix Status",
    "Fix Status Flags",
    "Date/Time Flags",
    "Number of SVs",
    "MSL Altitude",
    "Horizontal Accuracy",
    "Vertical Accuracy",
    "Speed Accuracy",
    "Heading Accuracy",
    "PDOP",
    "Lat/Lon Flags",
    "Battery/Input Voltage",
];

/// Which fields a decoded record exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    /// Position, motion and IMU fields only.
    #[default]
    Simple,
    /// Simple fields plus accuracy, flag and power fields.
    Extended,
}

impl SchemaVariant {
    /// Column names in output order.
    pub fn columns(self) -> Vec<&'static str> {
        match self {
            SchemaVariant::Simple => SIMPLE_COLUMNS.to_vec(),
            SchemaVariant::Extended => {
                SIMPLE_COLUMNS.iter().chain(EXTENDED_EXTRA_COLUMNS.iter()).copied().collect()
            }
        }
    }

    pub fn column_count(self) -> usize {
        match self {
            SchemaVariant::Simple => SIMPLE_COLUMNS.len(),
            SchemaVariant::Extended => SIMPLE_COLUMNS.len() + EXTENDED_EXTRA_COLUMNS.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_counts() {
        assert_eq!(SchemaVariant::Simple.columns().len(), 18);
        assert_eq!(SchemaVariant::Extended.columns().len(), 33);
        assert_eq!(SchemaVariant::Extended.column_count(), 33);
    }

    #[test]
    fn extended_starts_with_simple_columns() {
        let extended = SchemaVariant::Extended.columns();
        assert_eq!(&extended[..18], &SIMPLE_COLUMNS[..]);
        assert_eq!(extended.last(), Some(&"Battery/Input Voltage"));
    }
}
