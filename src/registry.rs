//! Static provider registry.
//!
//! Maps registry keys to constructors. The caller always names the provider
//! it wants; the registry never picks one on its own.

use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::ble::{self, BlePowerProvider};
use crate::config::{BleConfig, MockConfig};
use crate::error::{Error, Result};
use crate::mock::{self, MockPowerProvider};
use crate::provider::PowerProvider;

/// The known provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProviderKind {
    /// Bluetooth Low Energy sensors.
    Ble,
    /// Synthetic readings.
    Mock,
}

impl ProviderKind {
    /// Every kind, in preference order.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Ble, ProviderKind::Mock];

    /// Registry key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ble => ble::PROVIDER_NAME,
            Self::Mock => mock::NAME,
        }
    }

    /// Look a kind up by registry key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| Error::UnknownProvider {
            name: s.to_string(),
        })
    }
}

/// Settings handed to the registry by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProviderSettings {
    /// Offer the mock provider.
    pub mock_enabled: bool,
    /// BLE backend configuration.
    pub ble: BleConfig,
    /// Mock backend configuration.
    pub mock: MockConfig,
}

impl ProviderSettings {
    /// Enable or disable the mock provider.
    pub fn with_mock(mut self, enabled: bool) -> Self {
        self.mock_enabled = enabled;
        self
    }
}

/// Construct the provider registered under `name`.
///
/// # Errors
///
/// Returns [`Error::UnknownProvider`] for an unregistered name,
/// [`Error::ProviderDisabled`] when the settings turn the provider off and
/// [`Error::BluetoothUnavailable`] when the BLE provider has no adapter.
pub async fn create_provider(
    name: &str,
    settings: &ProviderSettings,
) -> Result<Box<dyn PowerProvider>> {
    let kind: ProviderKind = name.parse()?;
    debug!("Creating provider {}", kind);

    match kind {
        ProviderKind::Ble => {
            let provider = BlePowerProvider::with_default_adapter(settings.ble.clone()).await?;
            Ok(Box::new(provider))
        }
        ProviderKind::Mock => {
            if !settings.mock_enabled {
                return Err(Error::ProviderDisabled {
                    name: name.to_string(),
                });
            }
            Ok(Box::new(MockPowerProvider::new(settings.mock.clone())))
        }
    }
}

/// The provider kinds usable on this host with these settings.
pub async fn available_providers(settings: &ProviderSettings) -> Vec<ProviderKind> {
    let mut kinds = Vec::new();

    if ble::platform::adapter_available().await {
        kinds.push(ProviderKind::Ble);
    }
    if settings.mock_enabled {
        kinds.push(ProviderKind::Mock);
    }

    kinds
}
