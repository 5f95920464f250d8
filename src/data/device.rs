//! Device reference data structures.
//!
//! A `DeviceRef` describes a sensor surfaced by a scan and is what the
//! caller hands back to `connect`.

/// Immutable description of a discovered sensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceRef {
    /// Internal name of the provider that found the device.
    pub provider_id: String,
    /// Name advertised by the device (may be empty when unknown).
    pub display_name: String,
    /// Hardware address, e.g. `AA:BB:CC:DD:EE:01`.
    pub address: String,
}

impl DeviceRef {
    /// Create a new device reference.
    pub fn new(
        provider_id: impl Into<String>,
        display_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// The advertised name, or `None` if the device had none.
    pub fn device_name(&self) -> Option<&str> {
        if self.display_name.is_empty() {
            None
        } else {
            Some(&self.display_name)
        }
    }
}

impl std::fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device_name() {
            Some(name) => write!(f, "{} ({})", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}
