//! BLE scanning functionality.
//!
//! The scan coordinator owns the per-session deduplication set and the
//! address a pending connection attempt is waiting for. It turns raw
//! discovery events into outcomes for the connection state machine, which
//! decides what to report.

use std::collections::HashSet;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::ble::radio::{normalize_address, BleRadio, PlatformDevice};
use crate::data::DeviceRef;
use crate::error::{Error, Result};

/// What a discovery event amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No scan session is running.
    Inactive,
    /// The device a connection attempt is waiting for.
    Match(PlatformDevice),
    /// First sighting of this address in the session.
    NewDevice(DeviceRef),
    /// Already reported in this session.
    Duplicate,
}

/// Scan session bookkeeping.
#[derive(Debug)]
pub struct ScanCoordinator {
    /// Provider id stamped on surfaced devices.
    provider_id: String,
    /// Whether platform discovery is running.
    active: bool,
    /// Addresses reported in the current session.
    seen: HashSet<String>,
    /// Address a connection attempt is waiting for.
    pending: Option<String>,
}

impl ScanCoordinator {
    /// Create a coordinator for a provider.
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            active: false,
            seen: HashSet::new(),
            pending: None,
        }
    }

    /// Check if platform discovery is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start a scan session.
    ///
    /// Returns `false` when a session is already running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanUnavailable`] if the platform refuses to scan.
    pub fn start(&mut self, radio: &dyn BleRadio, services: &[Uuid]) -> Result<bool> {
        if self.active {
            debug!("Already scanning, ignoring start request");
            return Ok(false);
        }

        info!("Starting BLE scan for power sensors");

        radio
            .start_scan(services)
            .map_err(|e| Error::ScanUnavailable {
                reason: e.to_string(),
            })?;

        self.seen.clear();
        self.active = true;
        Ok(true)
    }

    /// Stop the scan session.
    ///
    /// Returns `false` when no session was running.
    pub fn stop(&mut self, radio: &dyn BleRadio) -> Result<bool> {
        if !self.active {
            trace!("Not scanning, ignoring stop request");
            return Ok(false);
        }

        info!("Stopping BLE scan");

        self.active = false;
        radio.stop_scan()?;
        Ok(true)
    }

    /// Wait for `address` to show up in the scan.
    pub fn set_pending(&mut self, address: &str) {
        self.pending = Some(normalize_address(address));
    }

    /// Forget the pending address.
    pub fn clear_pending(&mut self) {
        self.pending = None;
    }

    /// The address a connection attempt is waiting for.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// Classify a discovery event.
    pub fn on_discovered(&mut self, device: PlatformDevice) -> ScanOutcome {
        if !self.active {
            trace!("Discovery of {} outside a scan session", device.address);
            return ScanOutcome::Inactive;
        }

        let address = normalize_address(&device.address);

        if self.pending.as_deref() == Some(address.as_str()) {
            debug!("Pending device {} discovered", address);
            return ScanOutcome::Match(device);
        }

        if !self.seen.insert(address.clone()) {
            return ScanOutcome::Duplicate;
        }

        ScanOutcome::NewDevice(DeviceRef::new(
            self.provider_id.as_str(),
            device.name.unwrap_or_default(),
            address,
        ))
    }

    /// Number of distinct addresses seen in the current session.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::testing::{FakeRadio, Request};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn device(address: &str, name: &str) -> PlatformDevice {
        PlatformDevice::new(address, Some(name.to_string()))
    }

    #[test]
    fn test_start_is_idempotent() {
        let radio = FakeRadio::new();
        let mut scanner = ScanCoordinator::new("BLE");

        assert!(scanner.start(&radio, &[]).unwrap());
        assert!(!scanner.start(&radio, &[]).unwrap());
        assert!(scanner.stop(&radio).unwrap());
        assert!(!scanner.stop(&radio).unwrap());

        assert_eq!(
            radio.requests(),
            vec![Request::StartScan(vec![]), Request::StopScan]
        );
    }

    #[test]
    fn test_start_failure_is_scan_unavailable() {
        let radio = FakeRadio::new();
        radio.fail_scan(true);
        let mut scanner = ScanCoordinator::new("BLE");

        assert!(matches!(
            scanner.start(&radio, &[]),
            Err(Error::ScanUnavailable { .. })
        ));
        assert!(!scanner.is_active());
    }

    #[test]
    fn test_dedup_per_session() {
        let radio = FakeRadio::new();
        let mut scanner = ScanCoordinator::new("BLE");

        assert_eq!(
            scanner.on_discovered(device("AA:BB:CC:DD:EE:01", "PowerX")),
            ScanOutcome::Inactive
        );

        scanner.start(&radio, &[]).unwrap();
        assert_eq!(
            scanner.on_discovered(device("aa:bb:cc:dd:ee:01", "PowerX")),
            ScanOutcome::NewDevice(DeviceRef::new("BLE", "PowerX", "AA:BB:CC:DD:EE:01"))
        );
        assert_eq!(
            scanner.on_discovered(device("AA:BB:CC:DD:EE:01", "PowerX")),
            ScanOutcome::Duplicate
        );

        // A new session reports the device again.
        scanner.stop(&radio).unwrap();
        scanner.start(&radio, &[]).unwrap();
        assert!(matches!(
            scanner.on_discovered(device("AA:BB:CC:DD:EE:01", "PowerX")),
            ScanOutcome::NewDevice(_)
        ));
    }

    #[test]
    fn test_pending_match_uses_fresh_device() {
        let radio = FakeRadio::new();
        let mut scanner = ScanCoordinator::new("BLE");
        scanner.set_pending("aa:bb:cc:dd:ee:01");
        scanner.start(&radio, &[]).unwrap();

        let fresh = device("AA:BB:CC:DD:EE:01", "Fresh").with_rssi(-40);
        assert_eq!(
            scanner.on_discovered(fresh.clone()),
            ScanOutcome::Match(fresh)
        );

        scanner.clear_pending();
        assert!(scanner.pending().is_none());
    }

    #[test]
    fn test_unnamed_device_has_empty_display_name() {
        let radio = FakeRadio::new();
        let mut scanner = ScanCoordinator::new("BLE");
        scanner.start(&radio, &[]).unwrap();

        match scanner.on_discovered(PlatformDevice::new("AA:BB:CC:DD:EE:02", None)) {
            ScanOutcome::NewDevice(found) => assert_eq!(found.device_name(), None),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_one_report_per_address(indices in proptest::collection::vec(0u8..8, 0..64)) {
            let radio = FakeRadio::new();
            let mut scanner = ScanCoordinator::new("BLE");
            scanner.start(&radio, &[]).unwrap();

            let mut reported = 0;
            for index in &indices {
                let address = format!("AA:BB:CC:DD:EE:{index:02X}");
                if let ScanOutcome::NewDevice(_) = scanner.on_discovered(device(&address, "P")) {
                    reported += 1;
                }
            }

            let distinct: HashSet<_> = indices.iter().collect();
            prop_assert_eq!(reported, distinct.len());
            prop_assert_eq!(scanner.seen_count(), distinct.len());
        }
    }
}
