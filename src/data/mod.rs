//! Data structures for sensor data.
//!
//! This module contains the value types surfaced by providers: device
//! references, power samples, and the transient-zero watchdog.

pub mod device;
pub mod sample;
pub mod watchdog;

pub use device::DeviceRef;
pub use sample::{PowerData, PowerSample};
pub use watchdog::{ZeroValueWatchdog, ZeroVerdict};
