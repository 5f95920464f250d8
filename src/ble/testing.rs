//! Scripted radio for state machine tests.
//!
//! `FakeRadio` records every request and never produces events on its own;
//! tests feed the state machine the events a real adapter would produce.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::ble::characteristics::{GattCharacteristic, GattService, ServicesSnapshot};
use crate::ble::radio::{normalize_address, BleRadio, PlatformDevice, TransportHandle};
use crate::ble::uuids::*;
use crate::error::{Error, Result};

/// A request the state machine made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartScan(Vec<Uuid>),
    StopScan,
    Bind(String),
    Reconnect(TransportHandle),
    DiscoverServices(TransportHandle),
    ReadCharacteristic(Uuid),
    ReadDescriptor(Uuid),
    SetNotification(Uuid, bool),
    Disconnect(TransportHandle),
    Close(TransportHandle),
}

pub struct FakeRadio {
    available: AtomicBool,
    scan_fails: AtomicBool,
    requests: Mutex<Vec<Request>>,
    names: Mutex<HashMap<String, String>>,
    services: Mutex<ServicesSnapshot>,
    rejected_reads: Mutex<HashSet<Uuid>>,
}

impl FakeRadio {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            scan_fails: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            names: Mutex::new(HashMap::new()),
            services: Mutex::new(ServicesSnapshot::default()),
            rejected_reads: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn fail_scan(&self, fail: bool) {
        self.scan_fails.store(fail, Ordering::SeqCst);
    }

    /// Make the platform cache know a name for an address.
    pub fn set_cached_name(&self, address: &str, name: &str) {
        self.names
            .lock()
            .insert(normalize_address(address), name.to_string());
    }

    pub fn set_services(&self, services: ServicesSnapshot) {
        *self.services.lock() = services;
    }

    /// Refuse read requests for a characteristic.
    pub fn reject_read(&self, characteristic: Uuid) {
        self.rejected_reads.lock().insert(characteristic);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn has_request(&self, request: &Request) -> bool {
        self.requests.lock().contains(request)
    }

    fn record(&self, request: Request) {
        self.requests.lock().push(request);
    }
}

impl BleRadio for FakeRadio {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn start_scan(&self, services: &[Uuid]) -> Result<()> {
        if self.scan_fails.load(Ordering::SeqCst) {
            return Err(Error::Internal("scan refused".to_string()));
        }
        self.record(Request::StartScan(services.to_vec()));
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        self.record(Request::StopScan);
        Ok(())
    }

    fn remote_device(&self, address: &str) -> PlatformDevice {
        let name = self.names.lock().get(&normalize_address(address)).cloned();
        PlatformDevice::new(address, name)
    }

    fn bind(&self, device: &PlatformDevice) -> Result<TransportHandle> {
        self.record(Request::Bind(device.address.clone()));
        Ok(TransportHandle::new(device.address.as_str()))
    }

    fn reconnect(&self, handle: &TransportHandle) -> Result<()> {
        self.record(Request::Reconnect(handle.clone()));
        Ok(())
    }

    fn discover_services(&self, handle: &TransportHandle) -> Result<()> {
        self.record(Request::DiscoverServices(handle.clone()));
        Ok(())
    }

    fn services(&self, _handle: &TransportHandle) -> ServicesSnapshot {
        self.services.lock().clone()
    }

    fn read_characteristic(
        &self,
        _handle: &TransportHandle,
        _service: Uuid,
        characteristic: Uuid,
    ) -> Result<()> {
        if self.rejected_reads.lock().contains(&characteristic) {
            return Err(Error::ReadFailed {
                uuid: characteristic.to_string(),
            });
        }
        self.record(Request::ReadCharacteristic(characteristic));
        Ok(())
    }

    fn read_descriptor(
        &self,
        _handle: &TransportHandle,
        _service: Uuid,
        _characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<()> {
        self.record(Request::ReadDescriptor(descriptor));
        Ok(())
    }

    fn set_notification(
        &self,
        _handle: &TransportHandle,
        _service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<()> {
        self.record(Request::SetNotification(characteristic, enable));
        Ok(())
    }

    fn disconnect(&self, handle: &TransportHandle) -> Result<()> {
        self.record(Request::Disconnect(handle.clone()));
        Ok(())
    }

    fn close(&self, handle: &TransportHandle) {
        self.record(Request::Close(handle.clone()));
    }
}

/// A complete power sensor profile, optionally with a battery service.
pub fn power_profile(with_battery: bool) -> ServicesSnapshot {
    let mut services = vec![
        GattService::new(
            DEVICE_INFO_SERVICE_UUID,
            vec![GattCharacteristic::new(FIRMWARE_REVISION_UUID, vec![])],
        ),
        GattService::new(
            POWER_SERVICE_UUID,
            vec![GattCharacteristic::new(
                POWER_MEASUREMENT_UUID,
                vec![CLIENT_CHARACTERISTIC_CONFIG_UUID],
            )],
        ),
    ];

    if with_battery {
        services.push(GattService::new(
            BATTERY_SERVICE_UUID,
            vec![GattCharacteristic::new(BATTERY_LEVEL_UUID, vec![])],
        ));
    }

    ServicesSnapshot::new(services)
}
