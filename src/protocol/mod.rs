//! Protocol module for parsing characteristic values.
//!
//! This module contains the implementations for:
//! - Power measurement parsing
//! - Battery level parsing

pub mod battery;
pub mod power_measurement;

pub use battery::parse_battery_level;
pub use power_measurement::PowerMeasurement;
