//! GATT profile snapshots.
//!
//! A snapshot is what service discovery produced for one transport. It is
//! looked at while a connection is being set up (and once more to find the
//! characteristic to unsubscribe from) and is never kept.

use uuid::Uuid;

use crate::error::{Error, Result};

/// A discovered characteristic and the descriptors it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Descriptor UUIDs.
    pub descriptors: Vec<Uuid>,
}

impl GattCharacteristic {
    /// Create a characteristic description.
    pub fn new(uuid: Uuid, descriptors: Vec<Uuid>) -> Self {
        Self { uuid, descriptors }
    }

    /// Check if a descriptor exists.
    pub fn has_descriptor(&self, uuid: &Uuid) -> bool {
        self.descriptors.contains(uuid)
    }
}

/// A discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Characteristics of the service.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Create a service description.
    pub fn new(uuid: Uuid, characteristics: Vec<GattCharacteristic>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }

    /// Get a characteristic by UUID.
    pub fn characteristic(&self, uuid: &Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == *uuid)
    }
}

/// All services enumerated on one transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicesSnapshot {
    services: Vec<GattService>,
}

impl ServicesSnapshot {
    /// Create a snapshot.
    pub fn new(services: Vec<GattService>) -> Self {
        Self { services }
    }

    /// Iterate the services.
    pub fn iter(&self) -> impl Iterator<Item = &GattService> {
        self.services.iter()
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Get a service by UUID.
    pub fn service(&self, uuid: &Uuid) -> Option<&GattService> {
        self.services.iter().find(|s| s.uuid == *uuid)
    }

    /// Check if a service exists.
    pub fn has_service(&self, uuid: &Uuid) -> bool {
        self.service(uuid).is_some()
    }

    /// Find a characteristic, reporting which level of the path is missing.
    pub fn require_characteristic(
        &self,
        service: &Uuid,
        characteristic: &Uuid,
    ) -> Result<&GattCharacteristic> {
        let service = self.service(service).ok_or_else(|| Error::ServiceNotFound {
            uuid: service.to_string(),
        })?;

        service
            .characteristic(characteristic)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })
    }

    /// Find a descriptor, reporting which level of the path is missing.
    pub fn require_descriptor(
        &self,
        service: &Uuid,
        characteristic: &Uuid,
        descriptor: &Uuid,
    ) -> Result<()> {
        let characteristic = self.require_characteristic(service, characteristic)?;

        if characteristic.has_descriptor(descriptor) {
            Ok(())
        } else {
            Err(Error::DescriptorNotFound {
                uuid: descriptor.to_string(),
            })
        }
    }
}

impl FromIterator<GattService> for ServicesSnapshot {
    fn from_iter<I: IntoIterator<Item = GattService>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
