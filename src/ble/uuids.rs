//! BLE Service, Characteristic and Descriptor UUIDs.
//!
//! The wire profile of a power sensor: the power-measurement service, the
//! battery service and the device-information service.

use uuid::Uuid;

// Power Service
/// Power-measurement service UUID.
pub const POWER_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1818_0000_1000_8000_00805f9b34fb);
/// Power-measurement characteristic UUID (Notify).
pub const POWER_MEASUREMENT_UUID: Uuid = Uuid::from_u128(0x0000_2a63_0000_1000_8000_00805f9b34fb);

// Battery Service (Standard BLE)
/// Standard BLE Battery Service UUID.
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
/// Battery Level characteristic UUID (Read).
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

// Device Information Service (Standard BLE)
/// Standard BLE Device Information Service UUID.
pub const DEVICE_INFO_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180a_0000_1000_8000_00805f9b34fb);
/// Firmware Revision characteristic UUID.
pub const FIRMWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x0000_2a26_0000_1000_8000_00805f9b34fb);

/// Client characteristic configuration descriptor used to toggle notifications.
pub const CLIENT_CHARACTERISTIC_CONFIG_UUID: Uuid =
    Uuid::from_u128(0x0000_2a00_0000_1000_8000_00805f9b34fb);

/// Assigned number of the configuration descriptor as sensors expose it.
pub const GATT_CCC_DESCRIPTOR_UUID: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_00805f9b34fb);

/// Services the platform scan is filtered on.
pub const SCAN_SERVICE_UUIDS: [Uuid; 1] = [POWER_SERVICE_UUID];

/// Check if a characteristic UUID carries power samples.
pub fn is_power_measurement(uuid: &Uuid) -> bool {
    *uuid == POWER_MEASUREMENT_UUID
}
