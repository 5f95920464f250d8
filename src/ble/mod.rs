//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy backend: the radio seam,
//! the connection state machine driving it, and the btleplug radio used in
//! production.

pub mod characteristics;
pub mod connection;
pub mod handle;
pub mod platform;
pub mod provider;
pub mod radio;
pub mod scanner;
pub mod uuids;

#[cfg(test)]
pub(crate) mod testing;

pub use characteristics::{GattCharacteristic, GattService, ServicesSnapshot};
pub use connection::{BindPhase, ConnectionManager, ConnectionState, ProbeTarget};
pub use handle::{HandleCheck, HandleSlot};
pub use platform::BtleplugRadio;
pub use provider::BlePowerProvider;
pub use radio::{BleRadio, PlatformDevice, RadioEvent, TransportHandle};
pub use scanner::{ScanCoordinator, ScanOutcome};
pub use uuids::*;

/// Registry key of the BLE provider, also the source tag of its log lines.
pub const PROVIDER_NAME: &str = "BLE";

/// Human readable name of the BLE provider.
pub const DISPLAY_NAME: &str = "Bluetooth SMART (BLE)";
