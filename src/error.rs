//! Error types for the pwr-provider-ble crate.
//!
//! None of these cross the provider boundary as return values of mutating
//! operations: the connection state machine turns them into client sink
//! outcomes and log lines. They are still returned by constructors, the
//! registry and the internal handshake steps.

use std::time::Duration;
use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The platform refused to start a scan.
    #[error("Scan unavailable: {reason}")]
    ScanUnavailable {
        /// Description of why scanning could not start.
        reason: String,
    },

    /// Binding the transport to the device failed.
    #[error("Bind failed: {reason}")]
    BindFailed {
        /// Description of why the bind failed.
        reason: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// Descriptor not found on the device.
    #[error("Descriptor not found: {uuid}")]
    DescriptorNotFound {
        /// The UUID of the descriptor that was not found.
        uuid: String,
    },

    /// Enabling (or disabling) notifications failed.
    #[error("Subscription failed: {reason}")]
    SubscriptionFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// A characteristic or descriptor read was rejected or failed.
    #[error("Read failed: {uuid}")]
    ReadFailed {
        /// The UUID that could not be read.
        uuid: String,
    },

    /// The link did not confirm closure in time and was torn down locally.
    #[error("Disconnect timed out after {timeout:?}")]
    DisconnectTimedOut {
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// Only zero readings have arrived for longer than the tolerance window.
    #[error("No non-zero power reading for {elapsed:?}")]
    TransientZeroTimeout {
        /// Time since the last non-zero reading.
        elapsed: Duration,
    },

    /// Invalid data was received from the sensor.
    #[error("Invalid data received: {context}")]
    InvalidData {
        /// Description of what was invalid about the data.
        context: String,
    },

    /// No provider is registered under this name.
    #[error("Unknown provider: {name}")]
    UnknownProvider {
        /// The requested provider name.
        name: String,
    },

    /// The provider exists but is disabled by the supplied settings.
    #[error("Provider disabled: {name}")]
    ProviderDisabled {
        /// The requested provider name.
        name: String,
    },

    /// The provider has not been opened.
    #[error("Provider not open")]
    NotOpen,

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DescriptorNotFound {
            uuid: "00002a00-0000-1000-8000-00805f9b34fb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Descriptor not found: 00002a00-0000-1000-8000-00805f9b34fb"
        );

        let err = Error::DisconnectTimedOut {
            timeout: Duration::from_secs(2),
        };
        assert_eq!(err.to_string(), "Disconnect timed out after 2s");
    }
}
