//! The hardware integration seam.
//!
//! A [`BleRadio`] accepts requests without blocking and reports their
//! completion later as a [`RadioEvent`] on a single event stream. The
//! connection state machine only ever talks to the hardware through this
//! trait, which keeps it free of platform quirks and drivable by scripted
//! events.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::ble::characteristics::ServicesSnapshot;
use crate::error::Result;

static NEXT_HANDLE_SERIAL: AtomicU64 = AtomicU64::new(1);

struct HandleInner {
    serial: u64,
    address: String,
}

/// One transport instance bound to a device.
///
/// Handles compare by identity: two handles are equal only if they are
/// clones of the same bind, never because they point at the same address.
#[derive(Clone)]
pub struct TransportHandle(Arc<HandleInner>);

impl TransportHandle {
    /// Create a fresh handle for a device address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(Arc::new(HandleInner {
            serial: NEXT_HANDLE_SERIAL.fetch_add(1, Ordering::Relaxed),
            address: address.into(),
        }))
    }

    /// Process-unique number of this bind, for logs and lookups.
    pub fn serial(&self) -> u64 {
        self.0.serial
    }

    /// Address the handle was bound to.
    pub fn address(&self) -> &str {
        &self.0.address
    }
}

impl PartialEq for TransportHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TransportHandle {}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransportHandle#{}({})", self.0.serial, self.0.address)
    }
}

/// Normalise a hardware address for comparison.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// The platform's view of a device at one moment.
///
/// Values coming from a discovery event are fresh; the ones returned by
/// [`BleRadio::remote_device`] come from the platform cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDevice {
    /// Normalised hardware address.
    pub address: String,
    /// Name the platform has for the device, if any.
    pub name: Option<String>,
    /// Signal strength of the advertisement, if known.
    pub rssi: Option<i16>,
}

impl PlatformDevice {
    /// Create a device description.
    pub fn new(address: &str, name: Option<String>) -> Self {
        Self {
            address: normalize_address(address),
            name,
            rssi: None,
        }
    }

    /// Attach a signal strength.
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }
}

/// Completion of a radio request, or an unsolicited hardware change.
#[derive(Debug, Clone)]
pub enum RadioEvent {
    /// An advertisement was seen while scanning.
    Discovered(PlatformDevice),
    /// The link came up or went down.
    LinkStateChanged {
        /// Transport the change belongs to.
        handle: TransportHandle,
        /// Whether the link is now up.
        connected: bool,
    },
    /// Service discovery finished.
    ServicesDiscovered {
        /// Transport the discovery ran on.
        handle: TransportHandle,
        /// Whether the platform reported success.
        ok: bool,
    },
    /// A characteristic read finished.
    CharacteristicRead {
        /// Transport the read ran on.
        handle: TransportHandle,
        /// Characteristic that was read.
        characteristic: Uuid,
        /// The value read (empty on failure).
        value: Vec<u8>,
        /// Whether the platform reported success.
        ok: bool,
    },
    /// A descriptor read finished.
    DescriptorRead {
        /// Transport the read ran on.
        handle: TransportHandle,
        /// Characteristic owning the descriptor.
        characteristic: Uuid,
        /// Descriptor that was read.
        descriptor: Uuid,
        /// Whether the platform reported success.
        ok: bool,
    },
    /// A descriptor write (notification toggle) finished.
    DescriptorWritten {
        /// Transport the write ran on.
        handle: TransportHandle,
        /// Characteristic owning the descriptor.
        characteristic: Uuid,
        /// Descriptor that was written.
        descriptor: Uuid,
        /// Whether the platform reported success.
        ok: bool,
    },
    /// A notification arrived.
    CharacteristicChanged {
        /// Transport the notification arrived on.
        handle: TransportHandle,
        /// Characteristic that changed.
        characteristic: Uuid,
        /// The new value.
        value: Vec<u8>,
    },
}

impl RadioEvent {
    /// The transport this event refers to, if any.
    pub fn handle(&self) -> Option<&TransportHandle> {
        match self {
            Self::Discovered(_) => None,
            Self::LinkStateChanged { handle, .. }
            | Self::ServicesDiscovered { handle, .. }
            | Self::CharacteristicRead { handle, .. }
            | Self::DescriptorRead { handle, .. }
            | Self::DescriptorWritten { handle, .. }
            | Self::CharacteristicChanged { handle, .. } => Some(handle),
        }
    }
}

/// Request side of the hardware integration layer.
///
/// Every method returns immediately. `Ok` means the request was accepted;
/// its outcome arrives later as a [`RadioEvent`]. Events for a handle must
/// stop once [`BleRadio::close`] has been called for it.
pub trait BleRadio: Send + Sync + 'static {
    /// Whether an adapter is present and usable.
    fn is_available(&self) -> bool;

    /// Start reporting advertisements, optionally filtered on services.
    fn start_scan(&self, services: &[Uuid]) -> Result<()>;

    /// Stop reporting advertisements.
    fn stop_scan(&self) -> Result<()>;

    /// The platform's cached view of an address.
    fn remote_device(&self, address: &str) -> PlatformDevice;

    /// Create a new transport for the device and start linking.
    fn bind(&self, device: &PlatformDevice) -> Result<TransportHandle>;

    /// Ask an existing transport to link again.
    fn reconnect(&self, handle: &TransportHandle) -> Result<()>;

    /// Enumerate services on a linked transport.
    fn discover_services(&self, handle: &TransportHandle) -> Result<()>;

    /// The services enumerated so far.
    fn services(&self, handle: &TransportHandle) -> ServicesSnapshot;

    /// Read a characteristic value.
    fn read_characteristic(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<()>;

    /// Read a descriptor value.
    fn read_descriptor(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<()>;

    /// Enable or disable notifications by writing the configuration descriptor.
    fn set_notification(
        &self,
        handle: &TransportHandle,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<()>;

    /// Take the link down.
    fn disconnect(&self, handle: &TransportHandle) -> Result<()>;

    /// Release the transport. No events follow for this handle.
    fn close(&self, handle: &TransportHandle);
}
