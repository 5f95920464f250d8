//! The production radio, built on btleplug.
//!
//! btleplug exposes async calls; [`BleRadio`] wants fire-and-forget
//! requests. Each request spawns a task that performs the call and turns its
//! outcome into a [`RadioEvent`]. Adapter events (discoveries, link drops)
//! and characteristic notifications are forwarded the same way.

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::characteristics::{GattCharacteristic, GattService, ServicesSnapshot};
use crate::ble::radio::{normalize_address, BleRadio, PlatformDevice, RadioEvent, TransportHandle};
use crate::ble::uuids::{CLIENT_CHARACTERISTIC_CONFIG_UUID, GATT_CCC_DESCRIPTOR_UUID};
use crate::error::{Error, Result};

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

/// Name a platform descriptor the way the state machine knows it.
///
/// Sensors expose the configuration descriptor under its assigned number;
/// the profile calls it [`CLIENT_CHARACTERISTIC_CONFIG_UUID`].
fn profile_descriptor(uuid: Uuid) -> Uuid {
    if uuid == GATT_CCC_DESCRIPTOR_UUID {
        CLIENT_CHARACTERISTIC_CONFIG_UUID
    } else {
        uuid
    }
}

/// A peripheral seen by the adapter.
struct Cached {
    peripheral: Peripheral,
    name: Option<String>,
}

/// An open transport.
struct Link {
    handle: TransportHandle,
    peripheral: Peripheral,
    notifications: Option<JoinHandle<()>>,
}

/// State shared with the spawned request tasks.
#[derive(Clone)]
struct Shared {
    events: mpsc::UnboundedSender<RadioEvent>,
    links: Arc<RwLock<HashMap<u64, Link>>>,
}

impl Shared {
    /// Forward an event unless its transport has been closed.
    fn emit(&self, event: RadioEvent) {
        if let Some(handle) = event.handle() {
            if !self.links.read().contains_key(&handle.serial()) {
                trace!("Suppressing event for closed {:?}", handle);
                return;
            }
        }

        if self.events.send(event).is_err() {
            trace!("Radio event receiver dropped");
        }
    }

    /// Forward notifications of a freshly linked peripheral.
    async fn start_notifications(&self, handle: &TransportHandle, peripheral: &Peripheral) {
        let mut stream = match peripheral.notifications().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to get notification stream: {}", e);
                return;
            }
        };

        let shared = self.clone();
        let owner = handle.clone();
        let task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                shared.emit(RadioEvent::CharacteristicChanged {
                    handle: owner.clone(),
                    characteristic: notification.uuid,
                    value: notification.value,
                });
            }
            trace!("Notification stream of {:?} ended", owner);
        });

        match self.links.write().get_mut(&handle.serial()) {
            Some(link) => {
                if let Some(previous) = link.notifications.replace(task) {
                    previous.abort();
                }
            }
            None => task.abort(),
        }
    }
}

/// [`BleRadio`] over the first adapter of the host.
pub struct BtleplugRadio {
    adapter: Adapter,
    runtime: Handle,
    shared: Shared,
    peripherals: Arc<RwLock<HashMap<String, Cached>>>,
    scanning: Arc<AtomicBool>,
    central_task: JoinHandle<()>,
}

impl BtleplugRadio {
    /// Open the first adapter and return the radio with its event stream.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<(Self, mpsc::UnboundedReceiver<RadioEvent>)> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        let central_events = adapter.events().await.map_err(Error::Bluetooth)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let shared = Shared {
            events: tx,
            links: Arc::new(RwLock::new(HashMap::new())),
        };
        let peripherals = Arc::new(RwLock::new(HashMap::new()));
        let scanning = Arc::new(AtomicBool::new(false));

        let central_task = tokio::spawn(Self::central_loop(
            adapter.clone(),
            central_events,
            shared.clone(),
            peripherals.clone(),
            scanning.clone(),
        ));

        let radio = Self {
            adapter,
            runtime: Handle::current(),
            shared,
            peripherals,
            scanning,
            central_task,
        };

        Ok((radio, rx))
    }

    async fn central_loop(
        adapter: Adapter,
        mut events: CentralEvents,
        shared: Shared,
        peripherals: Arc<RwLock<HashMap<String, Cached>>>,
        scanning: Arc<AtomicBool>,
    ) {
        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    if scanning.load(Ordering::SeqCst) {
                        Self::process_peripheral(&adapter, &id, &shared, &peripherals).await;
                    }
                }
                CentralEvent::DeviceDisconnected(id) => {
                    debug!("Device disconnected: {:?}", id);
                    let handles: Vec<TransportHandle> = shared
                        .links
                        .read()
                        .values()
                        .filter(|link| link.peripheral.id() == id)
                        .map(|link| link.handle.clone())
                        .collect();

                    for handle in handles {
                        shared.emit(RadioEvent::LinkStateChanged {
                            handle,
                            connected: false,
                        });
                    }
                }
                _ => {}
            }
        }

        debug!("Adapter event loop ended");
    }

    /// Cache a discovered peripheral and report it.
    async fn process_peripheral(
        adapter: &Adapter,
        id: &PeripheralId,
        shared: &Shared,
        peripherals: &RwLock<HashMap<String, Cached>>,
    ) {
        let peripheral = match adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        let address = normalize_address(&peripheral.address().to_string());
        let mut device = PlatformDevice::new(&address, properties.local_name.clone());
        device.rssi = properties.rssi;

        peripherals.write().insert(
            address,
            Cached {
                peripheral,
                name: properties.local_name,
            },
        );

        shared.emit(RadioEvent::Discovered(device));
    }

    fn peripheral_for(&self, handle: &TransportHandle) -> Result<Peripheral> {
        self.shared
            .links
            .read()
            .get(&handle.serial())
            .map(|link| link.peripheral.clone())
            .ok_or_else(|| Error::Internal(format!("{handle:?} is closed")))
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic && c.service_uuid == service)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })
    }

    fn spawn_connect(&self, handle: TransportHandle, peripheral: Peripheral) {
        let shared = self.shared.clone();

        self.runtime.spawn(async move {
            let connected = match peripheral.connect().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to connect {:?}: {}", handle, e);
                    false
                }
            };

            if connected {
                shared.start_notifications(&handle, &peripheral).await;
            }

            shared.emit(RadioEvent::LinkStateChanged { handle, connected });
        });
    }
}

impl Drop for BtleplugRadio {
    fn drop(&mut self) {
        self.central_task.abort();
        for link in self.shared.links.write().values_mut() {
            if let Some(task) = link.notifications.take() {
                task.abort();
            }
        }
    }
}

impl BleRadio for BtleplugRadio {
    fn is_available(&self) -> bool {
        true
    }

    fn start_scan(&self, services: &[Uuid]) -> Result<()> {
        self.scanning.store(true, Ordering::SeqCst);

        let adapter = self.adapter.clone();
        let filter = ScanFilter {
            services: services.to_vec(),
        };
        self.runtime.spawn(async move {
            if let Err(e) = adapter.start_scan(filter).await {
                error!("Failed to start scan: {}", e);
            }
        });

        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        self.scanning.store(false, Ordering::SeqCst);

        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        });

        Ok(())
    }

    fn remote_device(&self, address: &str) -> PlatformDevice {
        let name = self
            .peripherals
            .read()
            .get(&normalize_address(address))
            .and_then(|cached| cached.name.clone());

        PlatformDevice::new(address, name)
    }

    fn bind(&self, device: &PlatformDevice) -> Result<TransportHandle> {
        let peripheral = self
            .peripherals
            .read()
            .get(&normalize_address(&device.address))
            .map(|cached| cached.peripheral.clone())
            .ok_or_else(|| Error::BindFailed {
                reason: format!("{} has not been seen by the adapter", device.address),
            })?;

        let handle = TransportHandle::new(device.address.as_str());
        self.shared.links.write().insert(
            handle.serial(),
            Link {
                handle: handle.clone(),
                peripheral: peripheral.clone(),
                notifications: None,
            },
        );

        debug!("Binding {:?}", handle);
        self.spawn_connect(handle.clone(), peripheral);
        Ok(handle)
    }

    fn reconnect(&self, handle: &TransportHandle) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        self.spawn_connect(handle.clone(), peripheral);
        Ok(())
    }

    fn discover_services(&self, handle: &TransportHandle) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        let shared = self.shared.clone();
        let handle = handle.clone();

        self.runtime.spawn(async move {
            let ok = match peripheral.discover_services().await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to discover services: {}", e);
                    false
                }
            };
            shared.emit(RadioEvent::ServicesDiscovered { handle, ok });
        });

        Ok(())
    }

    fn services(&self, handle: &TransportHandle) -> ServicesSnapshot {
        let Ok(peripheral) = self.peripheral_for(handle) else {
            return ServicesSnapshot::default();
        };

        peripheral
            .services()
            .iter()
            .map(|service| {
                GattService::new(
                    service.uuid,
                    service
                        .characteristics
                        .iter()
                        .map(|c| {
                            GattCharacteristic::new(
                                c.uuid,
                                c.descriptors
                                    .iter()
                                    .map(|d| profile_descriptor(d.uuid))
                                    .collect(),
                            )
                        })
                        .collect(),
                )
            })
            .collect()
    }

    fn read_characteristic(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        let target = Self::find_characteristic(&peripheral, service, characteristic)?;
        let shared = self.shared.clone();
        let handle = handle.clone();

        self.runtime.spawn(async move {
            let (value, ok) = match peripheral.read(&target).await {
                Ok(value) => (value, true),
                Err(e) => {
                    warn!("Failed to read {}: {}", target.uuid, e);
                    (Vec::new(), false)
                }
            };
            shared.emit(RadioEvent::CharacteristicRead {
                handle,
                characteristic: target.uuid,
                value,
                ok,
            });
        });

        Ok(())
    }

    fn read_descriptor(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        let target = Self::find_characteristic(&peripheral, service, characteristic)?
            .descriptors
            .into_iter()
            .find(|d| profile_descriptor(d.uuid) == descriptor)
            .ok_or_else(|| Error::DescriptorNotFound {
                uuid: descriptor.to_string(),
            })?;
        let shared = self.shared.clone();
        let handle = handle.clone();

        self.runtime.spawn(async move {
            let ok = match peripheral.read_descriptor(&target).await {
                Ok(_) => true,
                Err(e) => {
                    warn!("Failed to read descriptor {}: {}", target.uuid, e);
                    false
                }
            };
            shared.emit(RadioEvent::DescriptorRead {
                handle,
                characteristic,
                descriptor,
                ok,
            });
        });

        Ok(())
    }

    fn set_notification(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        let target = Self::find_characteristic(&peripheral, service, characteristic)?;
        let shared = self.shared.clone();
        let handle = handle.clone();

        self.runtime.spawn(async move {
            let result = if enable {
                peripheral.subscribe(&target).await
            } else {
                peripheral.unsubscribe(&target).await
            };

            if let Err(e) = &result {
                warn!("Failed to set notifications on {}: {}", target.uuid, e);
            }

            shared.emit(RadioEvent::DescriptorWritten {
                handle,
                characteristic,
                descriptor: CLIENT_CHARACTERISTIC_CONFIG_UUID,
                ok: result.is_ok(),
            });
        });

        Ok(())
    }

    fn disconnect(&self, handle: &TransportHandle) -> Result<()> {
        let peripheral = self.peripheral_for(handle)?;
        let shared = self.shared.clone();
        let handle = handle.clone();

        self.runtime.spawn(async move {
            match peripheral.disconnect().await {
                Ok(()) => shared.emit(RadioEvent::LinkStateChanged {
                    handle,
                    connected: false,
                }),
                Err(e) => warn!("Failed to disconnect {:?}: {}", handle, e),
            }
        });

        Ok(())
    }

    fn close(&self, handle: &TransportHandle) {
        if let Some(mut link) = self.shared.links.write().remove(&handle.serial()) {
            if let Some(task) = link.notifications.take() {
                task.abort();
            }
            debug!("Closed {:?}", link.handle);
        }
    }
}

/// Check whether the host has a Bluetooth adapter.
pub async fn adapter_available() -> bool {
    match Manager::new().await {
        Ok(manager) => manager
            .adapters()
            .await
            .map(|adapters| !adapters.is_empty())
            .unwrap_or(false),
        Err(_) => false,
    }
}
