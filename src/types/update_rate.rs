//! Update rate control for the live record stream

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate at which the device emits live records.
pub const DEVICE_RATE_HZ: f64 = 25.0;

/// Update rate for record subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every record as it is decoded
    #[default]
    Native,

    /// At most this many records per second, latest wins.
    /// Rates at or above the device rate behave like `Native`.
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the device rate
    pub fn normalize(self) -> Self {
        match self {
            UpdateRate::Max(hz) if f64::from(hz) >= DEVICE_RATE_HZ || hz == 0 => {
                UpdateRate::Native
            }
            other => other,
        }
    }

    /// Throttle interval, if throttling is needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self.normalize() {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_above_device_rate_are_native() {
        assert_eq!(UpdateRate::Max(25).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(100).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(0).normalize(), UpdateRate::Native);
        assert_eq!(UpdateRate::Max(5).normalize(), UpdateRate::Max(5));
    }

    #[test]
    fn throttle_interval() {
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
        assert_eq!(UpdateRate::Max(4).throttle_interval(), Some(Duration::from_millis(250)));
    }
}
