//! The uniform provider contract.
//!
//! Every backend (BLE, mock) implements [`PowerProvider`]. Mutating
//! operations return nothing: their outcomes reach the caller through the
//! [`ClientSender`] handed to [`PowerProvider::open`].

use async_trait::async_trait;

use crate::client::ClientSender;
use crate::data::{DeviceRef, PowerData, PowerSample};

/// A source of live power readings.
#[async_trait]
pub trait PowerProvider: Send + Sync {
    /// Human readable name.
    fn name(&self) -> &'static str;

    /// Registry key.
    fn provider_name(&self) -> &'static str;

    /// Whether the transport is usable on this host.
    fn is_enabled(&self) -> bool;

    /// Whether the platform bonds with devices of this provider.
    fn is_bonding_device(&self) -> bool;

    /// Attach a client. Reports `on_open_result`.
    ///
    /// Must be called from within a Tokio runtime.
    fn open(&self, client: ClientSender);

    /// Stop scanning, disconnect, report `on_close_result` and detach the client.
    async fn close(&self);

    /// Start surfacing nearby devices through `on_scan_result`.
    fn start_scan(&self);

    /// Stop surfacing devices.
    fn stop_scan(&self);

    /// Check if a scan is running.
    fn is_scanning(&self) -> bool;

    /// Start connecting. Reports `on_connect_result`.
    fn connect(&self, device: &DeviceRef);

    /// Disconnect, or cancel a connection attempt. Reports `on_disconnect_result`.
    async fn disconnect(&self);

    /// Check if a connection attempt is in progress.
    fn is_connecting(&self) -> bool;

    /// Check if connected.
    fn is_connected(&self) -> bool;

    /// Current power in watts.
    fn power_value(&self) -> u16;

    /// Unix time of the current reading in milliseconds.
    fn power_timestamp(&self) -> i64;

    /// Monotonic time of the current reading in nanoseconds.
    fn power_elapsed_realtime(&self) -> u64;

    /// The current reading.
    fn power_sample(&self) -> Option<PowerSample>;

    /// The current reading as data, if any.
    fn power_data(&self) -> Option<PowerData> {
        self.power_sample().map(|sample| sample.to_data())
    }

    /// Battery level in percent, if known.
    fn battery_level(&self) -> Option<u8>;
}
