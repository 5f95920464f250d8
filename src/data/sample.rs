//! Power sample data structures.

/// A decoded power reading with both timestamp forms.
///
/// The provider keeps exactly one of these: the most recent. It is
/// overwritten on every decode, never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerSample {
    /// Instantaneous power in watts.
    pub power: u16,
    /// Unix time of the reading in milliseconds.
    pub timestamp_wall_clock_ms: i64,
    /// Monotonic time of the reading in nanoseconds.
    pub timestamp_monotonic_ns: u64,
}

impl PowerSample {
    /// Create a new sample.
    pub fn new(power: u16, timestamp_wall_clock_ms: i64, timestamp_monotonic_ns: u64) -> Self {
        Self {
            power,
            timestamp_wall_clock_ms,
            timestamp_monotonic_ns,
        }
    }

    /// View this sample as `PowerData`.
    pub fn to_data(&self) -> PowerData {
        PowerData {
            power: self.power,
            timestamp_estimate_ms: self.timestamp_wall_clock_ms,
        }
    }
}

/// Power value with an estimated wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerData {
    /// Instantaneous power in watts.
    pub power: u16,
    /// Unix time in milliseconds.
    pub timestamp_estimate_ms: i64,
}
