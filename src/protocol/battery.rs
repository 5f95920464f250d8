//! Battery level parsing.

use crate::error::{Error, Result};

/// Parse the battery-level characteristic (uint8 percentage at offset 0).
pub fn parse_battery_level(data: &[u8]) -> Result<u8> {
    data.first().copied().ok_or_else(|| Error::InvalidData {
        context: "Battery level is empty".to_string(),
    })
}
