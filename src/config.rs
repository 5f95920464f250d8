//! Provider configuration.
//!
//! Configuration is consumed by providers, never persisted by them. The
//! timing values are empirical and tuned against real sensors, which is why
//! they are not constants.

use std::ops::Range;
use std::time::Duration;

/// Configuration for the BLE backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BleConfig {
    /// How long zero readings are tolerated after the last non-zero one.
    pub zero_value_timeout: Duration,
    /// How long `disconnect` waits for the link to confirm closure.
    pub disconnect_timeout: Duration,
    /// How many times a dropped link is re-bound while connecting.
    pub max_bind_retries: u32,
    /// Filter the platform scan on the power service.
    ///
    /// Some platforms drop results when a filtered scan is requested.
    pub scan_with_service_filter: bool,
}

impl BleConfig {
    /// Default transient-zero tolerance (60 seconds).
    pub const DEFAULT_ZERO_VALUE_TIMEOUT: Duration = Duration::from_secs(60);
    /// Default disconnect bound (2 seconds).
    pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Default number of re-binds while connecting.
    pub const DEFAULT_MAX_BIND_RETRIES: u32 = 3;

    /// Set the transient-zero tolerance.
    pub fn with_zero_value_timeout(mut self, timeout: Duration) -> Self {
        self.zero_value_timeout = timeout;
        self
    }

    /// Set the disconnect bound.
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Set the re-bind limit.
    pub fn with_max_bind_retries(mut self, retries: u32) -> Self {
        self.max_bind_retries = retries;
        self
    }

    /// Enable or disable the service filter on scans.
    pub fn with_scan_service_filter(mut self, enabled: bool) -> Self {
        self.scan_with_service_filter = enabled;
        self
    }
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            zero_value_timeout: Self::DEFAULT_ZERO_VALUE_TIMEOUT,
            disconnect_timeout: Self::DEFAULT_DISCONNECT_TIMEOUT,
            max_bind_retries: Self::DEFAULT_MAX_BIND_RETRIES,
            scan_with_service_filter: true,
        }
    }
}

/// Configuration for the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MockConfig {
    /// Delay between fake scan results.
    pub scan_interval: Duration,
    /// Number of fake scan results per scan.
    pub scan_results: u32,
    /// Delay before a connect succeeds.
    pub connect_delay: Duration,
    /// Delay between fake samples.
    pub sample_interval: Duration,
    /// Range fake power values are drawn from.
    pub power_range: Range<u16>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(3),
            scan_results: 3,
            connect_delay: Duration::from_secs(3),
            sample_interval: Duration::from_millis(750),
            power_range: 150..190,
        }
    }
}
