//! Stream combinators for record subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
