//! The BLE implementation of the provider contract.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ble::connection::ConnectionManager;
use crate::ble::radio::{BleRadio, RadioEvent};
use crate::ble::{DISPLAY_NAME, PROVIDER_NAME};
use crate::client::ClientSender;
use crate::clock::Clock;
use crate::config::BleConfig;
use crate::data::{DeviceRef, PowerSample};
use crate::error::Result;
use crate::provider::PowerProvider;

/// Power provider backed by a Bluetooth Low Energy radio.
///
/// Radio events are handled one at a time by a pump task started on the
/// first [`PowerProvider::open`].
pub struct BlePowerProvider {
    manager: Arc<ConnectionManager>,
    events: Mutex<Option<mpsc::UnboundedReceiver<RadioEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BlePowerProvider {
    /// Create a provider over a radio and the stream of its events.
    pub fn new(
        radio: Arc<dyn BleRadio>,
        events: mpsc::UnboundedReceiver<RadioEvent>,
        config: BleConfig,
    ) -> Self {
        Self::from_manager(Arc::new(ConnectionManager::new(radio, config)), events)
    }

    /// Create a provider with an explicit time source.
    pub fn with_clock(
        radio: Arc<dyn BleRadio>,
        events: mpsc::UnboundedReceiver<RadioEvent>,
        config: BleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_manager(
            Arc::new(ConnectionManager::with_clock(radio, config, clock)),
            events,
        )
    }

    fn from_manager(
        manager: Arc<ConnectionManager>,
        events: mpsc::UnboundedReceiver<RadioEvent>,
    ) -> Self {
        Self {
            manager,
            events: Mutex::new(Some(events)),
            pump: Mutex::new(None),
        }
    }

    /// Create a provider on the first Bluetooth adapter of the host.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn with_default_adapter(config: BleConfig) -> Result<Self> {
        let (radio, events) = crate::ble::platform::BtleplugRadio::new().await?;
        Ok(Self::new(Arc::new(radio), events, config))
    }

    /// The connection state machine.
    pub fn connection(&self) -> &ConnectionManager {
        &self.manager
    }

    fn start_pump(&self) {
        let Some(mut events) = self.events.lock().take() else {
            return;
        };

        let manager = self.manager.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                manager.handle_event(event);
            }
            debug!("Radio event stream ended");
        });

        *self.pump.lock() = Some(handle);
    }
}

impl Drop for BlePowerProvider {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl PowerProvider for BlePowerProvider {
    fn name(&self) -> &'static str {
        DISPLAY_NAME
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn is_enabled(&self) -> bool {
        self.manager.is_available()
    }

    fn is_bonding_device(&self) -> bool {
        true
    }

    fn open(&self, client: ClientSender) {
        self.start_pump();
        self.manager.open(client);
    }

    async fn close(&self) {
        self.manager.close().await;
    }

    fn start_scan(&self) {
        self.manager.start_scan();
    }

    fn stop_scan(&self) {
        self.manager.stop_scan();
    }

    fn is_scanning(&self) -> bool {
        self.manager.is_scanning()
    }

    fn connect(&self, device: &DeviceRef) {
        self.manager.connect(device);
    }

    async fn disconnect(&self) {
        self.manager.disconnect().await;
    }

    fn is_connecting(&self) -> bool {
        self.manager.is_connecting()
    }

    fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    fn power_value(&self) -> u16 {
        self.manager.power_value()
    }

    fn power_timestamp(&self) -> i64 {
        self.manager.power_timestamp()
    }

    fn power_elapsed_realtime(&self) -> u64 {
        self.manager.power_elapsed_realtime()
    }

    fn power_sample(&self) -> Option<PowerSample> {
        self.manager.power_sample()
    }

    fn battery_level(&self) -> Option<u8> {
        self.manager.battery_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::radio::PlatformDevice;
    use crate::ble::testing::{power_profile, FakeRadio};
    use crate::ble::uuids::*;
    use crate::client::{ClientDispatcher, ClientEvent, MockProviderClient};
    use crate::clock::ManualClock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:01";

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn provider() -> (
        Arc<FakeRadio>,
        mpsc::UnboundedSender<RadioEvent>,
        BlePowerProvider,
    ) {
        let radio = Arc::new(FakeRadio::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = BlePowerProvider::with_clock(
            radio.clone(),
            rx,
            BleConfig::default(),
            Arc::new(ManualClock::new(42_000)),
        );
        (radio, tx, provider)
    }

    #[test]
    fn test_identity() {
        let (_, _tx, provider) = provider();
        assert_eq!(provider.name(), "Bluetooth SMART (BLE)");
        assert_eq!(provider.provider_name(), "BLE");
        assert!(provider.is_enabled());
        assert!(provider.is_bonding_device());
        assert_eq!(provider.power_value(), 0);
        assert!(provider.power_data().is_none());
    }

    #[tokio::test]
    async fn test_pumped_handshake() {
        let (radio, tx, provider) = provider();
        let (client, mut rx) = ClientSender::channel();
        provider.open(client);

        radio.set_cached_name(ADDRESS, "PowerX");
        radio.set_services(power_profile(true));
        provider.connect(&DeviceRef::new("BLE", "PowerX", ADDRESS));
        let handle = provider
            .connection()
            .current_handle()
            .expect("bound on connect");

        for event in [
            RadioEvent::LinkStateChanged {
                handle: handle.clone(),
                connected: true,
            },
            RadioEvent::ServicesDiscovered {
                handle: handle.clone(),
                ok: true,
            },
            RadioEvent::CharacteristicRead {
                handle: handle.clone(),
                characteristic: BATTERY_LEVEL_UUID,
                value: vec![57],
                ok: true,
            },
            RadioEvent::DescriptorRead {
                handle: handle.clone(),
                characteristic: POWER_MEASUREMENT_UUID,
                descriptor: CLIENT_CHARACTERISTIC_CONFIG_UUID,
                ok: true,
            },
            RadioEvent::DescriptorWritten {
                handle: handle.clone(),
                characteristic: POWER_MEASUREMENT_UUID,
                descriptor: CLIENT_CHARACTERISTIC_CONFIG_UUID,
                ok: true,
            },
            RadioEvent::CharacteristicChanged {
                handle,
                characteristic: POWER_MEASUREMENT_UUID,
                value: vec![0x01, 0xC8, 0x00],
            },
        ] {
            tx.send(event).unwrap();
        }
        settle().await;

        assert!(provider.is_connected());
        assert_eq!(provider.power_value(), 200);
        assert_eq!(provider.battery_level(), Some(57));
        assert_eq!(provider.power_timestamp(), 42_000);
        assert_eq!(
            provider.power_data().map(|d| d.timestamp_estimate_ms),
            Some(42_000)
        );

        let outcomes: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| !e.is_log())
            .collect();
        assert_eq!(
            outcomes,
            vec![ClientEvent::OpenResult(true), ClientEvent::ConnectResult(true)]
        );
    }

    #[tokio::test]
    async fn test_scan_results_reach_client() {
        let (_radio, tx, provider) = provider();

        let mut client = MockProviderClient::new();
        client.expect_log().return_const(());
        client
            .expect_on_open_result()
            .with(eq(true))
            .times(1)
            .return_const(());
        client
            .expect_on_scan_result()
            .withf(|device| device.address == ADDRESS && device.display_name == "PowerX")
            .times(1)
            .return_const(());
        client
            .expect_on_close_result()
            .with(eq(true))
            .times(1)
            .return_const(());

        let (sender, dispatcher) = ClientDispatcher::spawn(Arc::new(client));
        provider.open(sender);
        provider.start_scan();
        assert!(provider.is_scanning());

        for _ in 0..3 {
            tx.send(RadioEvent::Discovered(PlatformDevice::new(
                ADDRESS,
                Some("PowerX".to_string()),
            )))
            .unwrap();
        }
        settle().await;

        provider.close().await;
        assert!(!provider.is_scanning());
        drop(provider);
        dispatcher.join().await;
    }
}
