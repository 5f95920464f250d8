//! BLE connection management.
//!
//! [`ConnectionManager`] is the connection state machine of the BLE
//! provider. Caller operations (`start_scan`, `connect`, `disconnect`, ...)
//! and hardware events ([`ConnectionManager::handle_event`]) both act on one
//! locked state record. Each event handler only acts in the states and
//! phases where its event is legal; everything else is logged and dropped.
//!
//! A connection attempt walks through these phases:
//!
//! ```text
//! ScanForMatch -> Binding -> DiscoverServices -> SecurityProbe
//!     -> ServiceLookup -> Subscribing -> Subscribed -> (Connected)
//! ```
//!
//! The first decoded sample completes the attempt.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::characteristics::ServicesSnapshot;
use crate::ble::handle::{HandleCheck, HandleSlot};
use crate::ble::radio::{BleRadio, PlatformDevice, RadioEvent, TransportHandle};
use crate::ble::scanner::{ScanCoordinator, ScanOutcome};
use crate::ble::uuids::*;
use crate::ble::PROVIDER_NAME;
use crate::client::ClientSender;
use crate::clock::{Clock, SystemClock};
use crate::config::BleConfig;
use crate::data::{DeviceRef, PowerData, PowerSample, ZeroValueWatchdog, ZeroVerdict};
use crate::error::{Error, Result};
use crate::protocol::{parse_battery_level, PowerMeasurement};

/// Connection state of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A user-requested scan is running.
    Scanning,
    /// A connection attempt is in progress.
    Connecting,
    /// Connected and receiving samples.
    Connected,
    /// A disconnect is in progress.
    Disconnecting,
}

impl ConnectionState {
    /// Check if scanning.
    pub fn is_scanning(&self) -> bool {
        matches!(self, Self::Scanning)
    }

    /// Check if connecting.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if disconnecting.
    pub fn is_disconnecting(&self) -> bool {
        matches!(self, Self::Disconnecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Characteristic read to trigger the platform's security handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeTarget {
    /// Battery level, which also gives us the battery reading.
    Battery,
    /// Firmware revision in the device information service.
    Firmware,
}

/// Step of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindPhase {
    /// Scanning for the target address.
    ScanForMatch,
    /// Transport bound, waiting for the link.
    Binding,
    /// Link up, enumerating services.
    DiscoverServices,
    /// Waiting for the probe read.
    SecurityProbe(ProbeTarget),
    /// Reading the configuration descriptor of the power characteristic.
    ServiceLookup,
    /// Waiting for the notification enable to be acknowledged.
    Subscribing,
    /// Notifications enabled, waiting for the first sample.
    Subscribed,
}

/// Everything the state machine mutates, behind one lock.
struct Inner {
    state: ConnectionState,
    phase: Option<BindPhase>,
    scanner: ScanCoordinator,
    client: Option<ClientSender>,
    target: Option<DeviceRef>,
    bind_retries: u32,
    has_battery_service: bool,
    battery_level: Option<u8>,
    sample: Option<PowerSample>,
    watchdog: ZeroValueWatchdog,
}

impl Inner {
    /// Log to tracing and forward the line to the client.
    fn log(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        if let Some(client) = &self.client {
            client.log(PROVIDER_NAME, message);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state changed: {} -> {}", self.state, state);
            self.state = state;
        }
        if state != ConnectionState::Connecting {
            self.phase = None;
        }
    }

    fn set_phase(&mut self, phase: BindPhase) {
        trace!("Bind phase: {:?} -> {:?}", self.phase, phase);
        self.phase = Some(phase);
    }

    fn in_phase(&self, phase: BindPhase) -> bool {
        self.state == ConnectionState::Connecting && self.phase == Some(phase)
    }

    fn awaiting_first_sample(&self) -> bool {
        self.state == ConnectionState::Connecting
            && matches!(
                self.phase,
                Some(BindPhase::Subscribing) | Some(BindPhase::Subscribed)
            )
    }
}

/// The BLE connection state machine.
pub struct ConnectionManager {
    radio: Arc<dyn BleRadio>,
    config: BleConfig,
    clock: Arc<dyn Clock>,
    handle: HandleSlot,
    inner: Mutex<Inner>,
}

impl ConnectionManager {
    /// Create a state machine driving `radio`.
    pub fn new(radio: Arc<dyn BleRadio>, config: BleConfig) -> Self {
        Self::with_clock(radio, config, Arc::new(SystemClock::new()))
    }

    /// Create a state machine with an explicit time source.
    pub fn with_clock(radio: Arc<dyn BleRadio>, config: BleConfig, clock: Arc<dyn Clock>) -> Self {
        let watchdog = ZeroValueWatchdog::new(config.zero_value_timeout);

        Self {
            radio,
            config,
            clock,
            handle: HandleSlot::new(),
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                phase: None,
                scanner: ScanCoordinator::new(PROVIDER_NAME),
                client: None,
                target: None,
                bind_retries: 0,
                has_battery_service: false,
                battery_level: None,
                sample: None,
                watchdog,
            }),
        }
    }

    /// Whether the radio is usable.
    pub fn is_available(&self) -> bool {
        self.radio.is_available()
    }

    /// Attach a client and report whether the radio is usable.
    pub fn open(&self, client: ClientSender) {
        let available = self.radio.is_available();
        let mut inner = self.inner.lock();

        inner.client = Some(client.clone());
        if available {
            info!("BLE provider opened");
        } else {
            warn!("BLE provider opened without a usable adapter");
        }
        client.open_result(available);
    }

    /// Check if a client is attached.
    pub fn is_open(&self) -> bool {
        self.inner.lock().client.is_some()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Current step of the connection attempt.
    pub fn phase(&self) -> Option<BindPhase> {
        self.inner.lock().phase
    }

    /// Check if a user-requested scan is running.
    pub fn is_scanning(&self) -> bool {
        self.state().is_scanning()
    }

    /// Check if a connection attempt is in progress.
    pub fn is_connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Check if a disconnect is in progress.
    pub fn is_disconnecting(&self) -> bool {
        self.state().is_disconnecting()
    }

    /// The device of the current or last connection attempt.
    pub fn target(&self) -> Option<DeviceRef> {
        self.inner.lock().target.clone()
    }

    /// The transport handle currently owned.
    pub fn current_handle(&self) -> Option<TransportHandle> {
        self.handle.current()
    }

    /// The most recent sample.
    pub fn power_sample(&self) -> Option<PowerSample> {
        self.inner.lock().sample
    }

    /// The most recent sample as data.
    pub fn power_data(&self) -> Option<PowerData> {
        self.power_sample().map(|sample| sample.to_data())
    }

    /// Current power in watts, 0 before the first sample.
    pub fn power_value(&self) -> u16 {
        self.power_sample().map(|s| s.power).unwrap_or(0)
    }

    /// Wall-clock time of the current reading in milliseconds, 0 before the first sample.
    pub fn power_timestamp(&self) -> i64 {
        self.power_sample()
            .map(|s| s.timestamp_wall_clock_ms)
            .unwrap_or(0)
    }

    /// Monotonic time of the current reading in nanoseconds, 0 before the first sample.
    pub fn power_elapsed_realtime(&self) -> u64 {
        self.power_sample()
            .map(|s| s.timestamp_monotonic_ns)
            .unwrap_or(0)
    }

    /// Battery level read during the handshake.
    pub fn battery_level(&self) -> Option<u8> {
        self.inner.lock().battery_level
    }

    fn scan_filter(&self) -> &'static [Uuid] {
        if self.config.scan_with_service_filter {
            &SCAN_SERVICE_UUIDS
        } else {
            &[]
        }
    }

    /// Start a user-visible scan.
    pub fn start_scan(&self) {
        let mut inner = self.inner.lock();

        if inner.client.is_none() {
            warn!("start_scan: {}", Error::NotOpen);
            return;
        }

        if inner.state != ConnectionState::Idle {
            if inner.state != ConnectionState::Scanning {
                inner.log(format!("Cannot scan while {}", inner.state));
            }
            return;
        }

        match inner.scanner.start(self.radio.as_ref(), self.scan_filter()) {
            Ok(true) => inner.set_state(ConnectionState::Scanning),
            Ok(false) => {}
            Err(e) => inner.log(format!("startScan failed: {e}")),
        }
    }

    /// Stop a user-visible scan.
    pub fn stop_scan(&self) {
        let mut inner = self.inner.lock();

        if inner.state != ConnectionState::Scanning {
            return;
        }

        if let Err(e) = inner.scanner.stop(self.radio.as_ref()) {
            inner.log(format!("stopScan failed: {e}"));
        }
        inner.set_state(ConnectionState::Idle);
    }

    /// Start a connection attempt. The outcome is reported to the client.
    pub fn connect(&self, device: &DeviceRef) {
        let mut inner = self.inner.lock();

        if inner.client.is_none() {
            warn!("connect: {}", Error::NotOpen);
            return;
        }

        match inner.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                inner.log(format!("connect({device}) ignored while {}", inner.state));
                return;
            }
            ConnectionState::Disconnecting => {
                inner.log(format!("connect({device}) ignored while disconnecting"));
                return;
            }
            ConnectionState::Scanning => {
                if let Err(e) = inner.scanner.stop(self.radio.as_ref()) {
                    inner.log(format!("stopScan failed: {e}"));
                }
            }
            ConnectionState::Idle => {}
        }

        info!("Connecting to {}", device);

        inner.target = Some(device.clone());
        inner.bind_retries = 0;
        inner.has_battery_service = false;
        inner.battery_level = None;
        inner.sample = None;
        inner.set_state(ConnectionState::Connecting);

        let cached = self.radio.remote_device(&device.address);
        let name_matches = match (device.device_name(), cached.name.as_deref()) {
            (Some(wanted), Some(known)) => wanted == known,
            _ => false,
        };

        if name_matches {
            inner.log(format!("{} is known to the platform, binding directly", cached.address));
            self.bind(&mut inner, &cached);
            return;
        }

        inner.log(format!("Scanning for {} before binding", cached.address));
        inner.set_phase(BindPhase::ScanForMatch);
        inner.scanner.set_pending(&device.address);

        if let Err(e) = inner.scanner.start(self.radio.as_ref(), self.scan_filter()) {
            self.fail_connect(&mut inner, e);
        }
    }

    /// Create a transport for `device` and install it as the owned handle.
    fn bind(&self, inner: &mut Inner, device: &PlatformDevice) {
        inner.set_phase(BindPhase::Binding);

        match self.radio.bind(device) {
            Ok(handle) => {
                debug!("Bound {:?}", handle);
                if let Some(previous) = self.handle.replace(handle) {
                    self.radio.close(&previous);
                }
            }
            Err(e) => self.fail_connect(
                inner,
                Error::BindFailed {
                    reason: e.to_string(),
                },
            ),
        }
    }

    /// Stop scanning and release the owned transport.
    fn release_link(&self, inner: &mut Inner) {
        if let Err(e) = inner.scanner.stop(self.radio.as_ref()) {
            inner.log(format!("stopScan failed: {e}"));
        }
        inner.scanner.clear_pending();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.radio.disconnect(&handle) {
                trace!("Disconnect of {:?} failed: {}", handle, e);
            }
            self.radio.close(&handle);
        }
    }

    /// Abandon the attempt and report a negative connect result.
    fn fail_connect(&self, inner: &mut Inner, error: Error) {
        warn!("Connection attempt failed: {}", error);
        inner.log(format!("reportConnectFailed({error})"));

        self.release_link(inner);
        inner.set_state(ConnectionState::Idle);

        if let Some(client) = &inner.client {
            client.connect_result(false);
        }
    }

    /// Tear down an established link that went away without being asked to.
    fn lose_link(&self, inner: &mut Inner, error: Error) {
        warn!("Connection lost: {}", error);
        inner.log(format!("Connection lost: {error}"));

        self.release_link(inner);
        inner.set_state(ConnectionState::Idle);

        if let Some(client) = &inner.client {
            client.disconnect_result(true);
        }
    }

    /// Disable power notifications on `handle`.
    fn unsubscribe(&self, handle: &TransportHandle) -> Result<()> {
        let services = self.radio.services(handle);
        services.require_characteristic(&POWER_SERVICE_UUID, &POWER_MEASUREMENT_UUID)?;

        self.radio
            .set_notification(handle, POWER_SERVICE_UUID, POWER_MEASUREMENT_UUID, false)
            .map_err(|e| Error::SubscriptionFailed {
                reason: e.to_string(),
            })
    }

    /// Disconnect from the sensor, or cancel a connection attempt.
    ///
    /// When the link was established this waits up to the configured
    /// disconnect timeout for the hardware to confirm, then tears the
    /// transport down locally regardless.
    pub async fn disconnect(&self) {
        let (handle, was_connected) = {
            let mut inner = self.inner.lock();

            match inner.state {
                ConnectionState::Connecting | ConnectionState::Connected => {}
                ConnectionState::Disconnecting => {
                    debug!("Already disconnecting");
                    return;
                }
                ConnectionState::Idle | ConnectionState::Scanning => {
                    debug!("Not connected, ignoring disconnect");
                    return;
                }
            }

            let was_connected = inner.state == ConnectionState::Connected;
            let subscribed = was_connected
                || matches!(
                    inner.phase,
                    Some(BindPhase::Subscribing) | Some(BindPhase::Subscribed)
                );

            info!("Disconnecting");
            inner.set_state(ConnectionState::Disconnecting);

            if let Err(e) = inner.scanner.stop(self.radio.as_ref()) {
                inner.log(format!("stopScan failed: {e}"));
            }
            inner.scanner.clear_pending();

            let Some(handle) = self.handle.current() else {
                inner.log("Connection attempt cancelled before binding");
                inner.set_state(ConnectionState::Idle);
                if let Some(client) = &inner.client {
                    client.disconnect_result(true);
                }
                return;
            };

            if subscribed {
                if let Err(e) = self.unsubscribe(&handle) {
                    inner.log(format!("disconnect failed: {e}"));
                    if let Some(client) = &inner.client {
                        client.disconnect_result(false);
                    }
                }
            }

            if let Err(e) = self.radio.disconnect(&handle) {
                inner.log(format!("Link disconnect request failed: {e}"));
            }

            (handle, was_connected)
        };

        if was_connected {
            let timeout = self.config.disconnect_timeout;
            if !self.handle.wait_cleared(timeout).await {
                let error = Error::DisconnectTimedOut { timeout };
                warn!("{}", error);
                self.inner.lock().log(format!("{error}, closing locally"));
            }
        }

        let mut inner = self.inner.lock();

        if self.handle.take_if(&handle) {
            self.radio.close(&handle);
        }

        if inner.state == ConnectionState::Disconnecting {
            inner.set_state(ConnectionState::Idle);
            info!("Disconnected");
            if let Some(client) = &inner.client {
                client.disconnect_result(true);
            }
        }
    }

    /// Stop everything, report the close and detach the client.
    pub async fn close(&self) {
        self.stop_scan();

        let state = self.state();
        if state.is_connecting() || state.is_connected() {
            self.disconnect().await;
        }

        let mut inner = self.inner.lock();

        if let Some(handle) = self.handle.take() {
            self.radio.close(&handle);
        }
        inner.scanner.clear_pending();
        inner.set_state(ConnectionState::Idle);

        if let Some(client) = inner.client.take() {
            info!("BLE provider closed");
            client.close_result(true);
        }
    }

    /// Process one hardware event.
    ///
    /// Errors raised while handling the event never leave this function;
    /// they end the connection attempt or the connection instead.
    pub fn handle_event(&self, event: RadioEvent) {
        let mut inner = self.inner.lock();

        if inner.client.is_none() {
            trace!("Provider not open, dropping {:?}", event);
            return;
        }

        if let Some(handle) = event.handle() {
            if !self.accept(&inner, handle) {
                return;
            }
        }

        let result = match event {
            RadioEvent::Discovered(device) => self.on_discovered(&mut inner, device),
            RadioEvent::LinkStateChanged { handle, connected } => {
                self.on_link_state(&mut inner, &handle, connected)
            }
            RadioEvent::ServicesDiscovered { handle, ok } => {
                self.on_services_discovered(&mut inner, &handle, ok)
            }
            RadioEvent::CharacteristicRead {
                handle,
                characteristic,
                value,
                ok,
            } => self.on_characteristic_read(&mut inner, &handle, characteristic, &value, ok),
            RadioEvent::DescriptorRead {
                handle,
                characteristic,
                descriptor,
                ok,
            } => self.on_descriptor_read(&mut inner, &handle, characteristic, descriptor, ok),
            RadioEvent::DescriptorWritten {
                characteristic,
                ok,
                ..
            } => self.on_descriptor_written(&mut inner, characteristic, ok),
            RadioEvent::CharacteristicChanged {
                characteristic,
                value,
                ..
            } => self.on_characteristic_changed(&mut inner, characteristic, &value),
        };

        if let Err(e) = result {
            match inner.state {
                ConnectionState::Connecting => self.fail_connect(&mut inner, e),
                ConnectionState::Connected => self.lose_link(&mut inner, e),
                _ => inner.log(format!("Error while {}: {e}", inner.state)),
            }
        }
    }

    /// Check an event's transport against the owned one.
    fn accept(&self, inner: &Inner, handle: &TransportHandle) -> bool {
        let adopt = inner.state == ConnectionState::Connecting;

        let check = self.handle.check(handle, adopt);
        match check {
            HandleCheck::Owned => {}
            HandleCheck::Adopted => inner.log(format!("Adopted transport {handle:?}")),
            HandleCheck::Foreign => {
                inner.log(format!("Ignoring event for foreign transport {handle:?}"))
            }
        }
        check.is_accepted()
    }

    fn on_discovered(&self, inner: &mut Inner, device: PlatformDevice) -> Result<()> {
        match inner.scanner.on_discovered(device) {
            ScanOutcome::Inactive | ScanOutcome::Duplicate => Ok(()),
            ScanOutcome::NewDevice(found) => {
                debug!("Discovered {}", found);
                if let Some(client) = &inner.client {
                    client.scan_result(found);
                }
                Ok(())
            }
            ScanOutcome::Match(device) => {
                if !inner.in_phase(BindPhase::ScanForMatch) {
                    return Ok(());
                }

                inner.log(format!("Found {}, binding", device.address));
                if let Err(e) = inner.scanner.stop(self.radio.as_ref()) {
                    inner.log(format!("stopScan failed: {e}"));
                }
                inner.scanner.clear_pending();
                self.bind(inner, &device);
                Ok(())
            }
        }
    }

    fn on_link_state(
        &self,
        inner: &mut Inner,
        handle: &TransportHandle,
        connected: bool,
    ) -> Result<()> {
        match (inner.state, connected) {
            (ConnectionState::Connecting, true) => {
                if inner.phase != Some(BindPhase::Binding) {
                    inner.log(format!("Link up in phase {:?}, ignoring", inner.phase));
                    return Ok(());
                }

                inner.set_phase(BindPhase::DiscoverServices);
                self.radio
                    .discover_services(handle)
                    .map_err(|e| Error::BindFailed {
                        reason: format!("service discovery refused: {e}"),
                    })
            }
            (ConnectionState::Connecting, false) => {
                if inner.bind_retries >= self.config.max_bind_retries {
                    return Err(Error::BindFailed {
                        reason: format!("link lost after {} reconnects", inner.bind_retries),
                    });
                }

                inner.bind_retries += 1;
                inner.log(format!(
                    "Link lost while connecting, reconnecting ({} of {})",
                    inner.bind_retries, self.config.max_bind_retries
                ));
                inner.set_phase(BindPhase::Binding);
                self.radio.reconnect(handle).map_err(|e| Error::BindFailed {
                    reason: e.to_string(),
                })
            }
            (ConnectionState::Connected, false) => {
                self.lose_link(
                    inner,
                    Error::BindFailed {
                        reason: "link went down".to_string(),
                    },
                );
                Ok(())
            }
            (ConnectionState::Disconnecting, false) => {
                debug!("Link closure confirmed");
                if self.handle.take_if(handle) {
                    self.radio.close(handle);
                }
                Ok(())
            }
            (state, connected) => {
                inner.log(format!(
                    "Ignoring link {} while {}",
                    if connected { "up" } else { "down" },
                    state
                ));
                Ok(())
            }
        }
    }

    fn on_services_discovered(
        &self,
        inner: &mut Inner,
        handle: &TransportHandle,
        ok: bool,
    ) -> Result<()> {
        if !inner.in_phase(BindPhase::DiscoverServices) {
            inner.log(format!("Unexpected service discovery while {}", inner.state));
            return Ok(());
        }

        // A failed status still leaves whatever was enumerated usable.
        if !ok {
            inner.log("Service discovery reported failure, probing anyway");
        }

        let services = self.radio.services(handle);
        for service in services.iter() {
            trace!("Found service {}", service.uuid);
        }
        inner.has_battery_service = services.has_service(&BATTERY_SERVICE_UUID);

        self.start_security_probe(inner, handle, &services)
    }

    /// Issue the read that makes the platform negotiate security.
    fn start_security_probe(
        &self,
        inner: &mut Inner,
        handle: &TransportHandle,
        services: &ServicesSnapshot,
    ) -> Result<()> {
        if inner.has_battery_service {
            services.require_characteristic(&BATTERY_SERVICE_UUID, &BATTERY_LEVEL_UUID)?;

            inner.set_phase(BindPhase::SecurityProbe(ProbeTarget::Battery));
            match self
                .radio
                .read_characteristic(handle, BATTERY_SERVICE_UUID, BATTERY_LEVEL_UUID)
            {
                Ok(()) => return Ok(()),
                Err(e) => inner.log(format!("Battery level read refused ({e}), reading firmware")),
            }
        }

        services.require_characteristic(&DEVICE_INFO_SERVICE_UUID, &FIRMWARE_REVISION_UUID)?;

        inner.set_phase(BindPhase::SecurityProbe(ProbeTarget::Firmware));
        self.radio
            .read_characteristic(handle, DEVICE_INFO_SERVICE_UUID, FIRMWARE_REVISION_UUID)
            .map_err(|_| Error::ReadFailed {
                uuid: FIRMWARE_REVISION_UUID.to_string(),
            })
    }

    fn on_characteristic_read(
        &self,
        inner: &mut Inner,
        handle: &TransportHandle,
        characteristic: Uuid,
        value: &[u8],
        ok: bool,
    ) -> Result<()> {
        let target = match inner.phase {
            Some(BindPhase::SecurityProbe(target)) if inner.state.is_connecting() => target,
            _ => {
                inner.log(format!("Unexpected read of {characteristic} while {}", inner.state));
                return Ok(());
            }
        };

        match target {
            ProbeTarget::Battery if characteristic == BATTERY_LEVEL_UUID => {
                if !ok {
                    inner.log("Battery level read failed, level unknown");
                } else {
                    match parse_battery_level(value) {
                        Ok(level) => {
                            inner.log(format!("Battery level: {level}"));
                            inner.battery_level = Some(level);
                        }
                        Err(e) => inner.log(format!("Bad battery level: {e}")),
                    }
                }
            }
            ProbeTarget::Firmware if characteristic == FIRMWARE_REVISION_UUID => {
                if ok {
                    inner.log(format!(
                        "Firmware revision: {}",
                        String::from_utf8_lossy(value).trim_end_matches('\0')
                    ));
                } else {
                    inner.log("Firmware revision read failed");
                }
            }
            _ => {
                inner.log(format!("Unknown characteristic received: {characteristic}"));
                return Ok(());
            }
        }

        self.lookup_power_service(inner, handle)
    }

    /// Locate the power characteristic and read its configuration descriptor.
    fn lookup_power_service(&self, inner: &mut Inner, handle: &TransportHandle) -> Result<()> {
        inner.set_phase(BindPhase::ServiceLookup);

        let services = self.radio.services(handle);
        services.require_descriptor(
            &POWER_SERVICE_UUID,
            &POWER_MEASUREMENT_UUID,
            &CLIENT_CHARACTERISTIC_CONFIG_UUID,
        )?;

        self.radio
            .read_descriptor(
                handle,
                POWER_SERVICE_UUID,
                POWER_MEASUREMENT_UUID,
                CLIENT_CHARACTERISTIC_CONFIG_UUID,
            )
            .map_err(|_| Error::ReadFailed {
                uuid: CLIENT_CHARACTERISTIC_CONFIG_UUID.to_string(),
            })
    }

    fn on_descriptor_read(
        &self,
        inner: &mut Inner,
        handle: &TransportHandle,
        characteristic: Uuid,
        descriptor: Uuid,
        ok: bool,
    ) -> Result<()> {
        if !inner.in_phase(BindPhase::ServiceLookup)
            || characteristic != POWER_MEASUREMENT_UUID
            || descriptor != CLIENT_CHARACTERISTIC_CONFIG_UUID
        {
            inner.log(format!("Unexpected descriptor read {descriptor} while {}", inner.state));
            return Ok(());
        }

        if !ok {
            inner.log("Configuration descriptor read failed, enabling notifications anyway");
        }

        inner.set_phase(BindPhase::Subscribing);
        self.radio
            .set_notification(handle, POWER_SERVICE_UUID, POWER_MEASUREMENT_UUID, true)
            .map_err(|e| Error::SubscriptionFailed {
                reason: e.to_string(),
            })
    }

    fn on_descriptor_written(&self, inner: &mut Inner, characteristic: Uuid, ok: bool) -> Result<()> {
        if inner.state.is_disconnecting() {
            debug!("Notifications disabled on {} (ok: {})", characteristic, ok);
            return Ok(());
        }

        if !inner.in_phase(BindPhase::Subscribing) || characteristic != POWER_MEASUREMENT_UUID {
            inner.log(format!("Unexpected descriptor write on {characteristic}"));
            return Ok(());
        }

        if !ok {
            return Err(Error::SubscriptionFailed {
                reason: "notification enable rejected".to_string(),
            });
        }

        inner.set_phase(BindPhase::Subscribed);
        inner.log("Subscribed to power measurements");
        Ok(())
    }

    fn on_characteristic_changed(
        &self,
        inner: &mut Inner,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        if !is_power_measurement(&characteristic) {
            inner.log(format!("Ignoring notification from {characteristic}"));
            return Ok(());
        }

        let completing = inner.awaiting_first_sample();
        if !completing && !inner.state.is_connected() {
            trace!("Dropping sample while {}", inner.state);
            return Ok(());
        }

        if value.is_empty() {
            inner.log("Empty power measurement, discarded");
            return Ok(());
        }

        let measurement = PowerMeasurement::parse(value)?;
        let now_ns = self.clock.monotonic_ns();
        let now_ms = self.clock.wall_clock_ms();

        let power = match inner.watchdog.observe(measurement.power, now_ns) {
            ZeroVerdict::NonZero => measurement.power,
            ZeroVerdict::Tolerated => inner.sample.map(|s| s.power).unwrap_or(0),
            ZeroVerdict::Expired { elapsed } => {
                return Err(Error::TransientZeroTimeout { elapsed });
            }
        };
        inner.sample = Some(PowerSample::new(power, now_ms, now_ns));
        trace!("Power: {} W (raw {})", power, measurement.power);

        if completing {
            inner.set_state(ConnectionState::Connected);
            if let Some(target) = &inner.target {
                info!("Connected to {}", target);
            }
            if let Some(client) = &inner.client {
                client.connect_result(true);
            }
        }

        Ok(())
    }
}
