// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # pwr-provider-ble
//!
//! Live power and battery readings from Bluetooth Low Energy cycling power
//! sensors, exposed through one provider contract shared by every backend.
//!
//! ## Features
//!
//! - **Scanning**: Surface nearby power sensors, each once per scan
//! - **Connection state machine**: Discovery, security probe, battery read
//!   and notification subscription driven by hardware events
//! - **Transient-zero tolerance**: Short runs of zero readings keep the last
//!   real value
//! - **Bounded disconnect**: `disconnect` never waits longer than configured
//! - **Mock backend**: Synthetic sensors for working without hardware
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pwr_provider_ble::{
//!     create_provider, ClientEvent, ClientSender, PowerProvider, ProviderSettings, Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let provider = create_provider("BLE", &ProviderSettings::default()).await?;
//!
//!     let (client, mut events) = ClientSender::channel();
//!     provider.open(client);
//!     provider.start_scan();
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             ClientEvent::ScanResult(device) => provider.connect(&device),
//!             ClientEvent::ConnectResult(true) => break,
//!             _ => {}
//!         }
//!     }
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     println!("Power: {} W", provider.power_value());
//!
//!     provider.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data and config types

// Public modules
pub mod ble;
pub mod client;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod provider;
pub mod registry;

// Re-exports for convenience
pub use ble::{BlePowerProvider, BleRadio, ConnectionState, RadioEvent, TransportHandle};
pub use client::{ClientDispatcher, ClientEvent, ClientSender, ProviderClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BleConfig, MockConfig};
pub use data::{DeviceRef, PowerData, PowerSample};
pub use error::{Error, Result};
pub use mock::MockPowerProvider;
pub use provider::PowerProvider;
pub use registry::{available_providers, create_provider, ProviderKind, ProviderSettings};
