//! Transient-zero tolerance.
//!
//! Some sensors report a power of zero while they are still linked but
//! cannot produce a reading. A zero is therefore only treated as a lost
//! sensor once no non-zero value has been seen for longer than the window.

use std::time::Duration;

/// What a decoded value means for the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroVerdict {
    /// A real reading; it becomes the current value.
    NonZero,
    /// A zero inside the tolerance window; keep the cached value.
    Tolerated,
    /// A zero after the window elapsed; the sensor is considered gone.
    Expired {
        /// Time since the last non-zero reading.
        elapsed: Duration,
    },
}

/// Tracks the last non-zero reading on the monotonic clock.
#[derive(Debug, Clone)]
pub struct ZeroValueWatchdog {
    last_non_zero_ns: Option<u64>,
    window: Duration,
}

impl ZeroValueWatchdog {
    /// Create a watchdog with the given tolerance window.
    pub fn new(window: Duration) -> Self {
        Self {
            last_non_zero_ns: None,
            window,
        }
    }

    /// Classify a decoded value observed at `now_ns`.
    ///
    /// A zero is tolerated when no non-zero reading has been seen yet.
    pub fn observe(&mut self, power: u16, now_ns: u64) -> ZeroVerdict {
        if power != 0 {
            self.last_non_zero_ns = Some(now_ns);
            return ZeroVerdict::NonZero;
        }

        match self.last_non_zero_ns {
            Some(last) => {
                let elapsed = Duration::from_nanos(now_ns.saturating_sub(last));
                if elapsed > self.window {
                    ZeroVerdict::Expired { elapsed }
                } else {
                    ZeroVerdict::Tolerated
                }
            }
            None => ZeroVerdict::Tolerated,
        }
    }

    /// Monotonic timestamp of the last non-zero reading.
    pub fn last_non_zero_ns(&self) -> Option<u64> {
        self.last_non_zero_ns
    }
}
