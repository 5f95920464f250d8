//! Power measurement parsing.
//!
//! Parses notifications from the power-measurement characteristic.

use bytes::Buf;

use crate::error::{Error, Result};

/// Flag bit selecting a 16-bit power field.
const FLAG_POWER_U16: u8 = 0x01;

/// A parsed power-measurement notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerMeasurement {
    /// Raw flags byte.
    pub flags: u8,
    /// Power in watts.
    pub power: u16,
}

impl PowerMeasurement {
    /// Parse a power measurement from notification data.
    ///
    /// Layout:
    /// - Byte 0: flags (bit 0 set: power is uint16 little-endian, else uint8)
    /// - Byte 1..: power
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = data;

        if !buf.has_remaining() {
            return Err(Error::InvalidData {
                context: "Power measurement is empty".to_string(),
            });
        }

        let flags = buf.get_u8();
        let wide = flags & FLAG_POWER_U16 != 0;
        let needed = if wide { 2 } else { 1 };

        if buf.remaining() < needed {
            return Err(Error::InvalidData {
                context: format!(
                    "Power measurement too short: {} bytes (need {})",
                    data.len(),
                    needed + 1
                ),
            });
        }

        let power = if wide {
            buf.get_u16_le()
        } else {
            u16::from(buf.get_u8())
        };

        Ok(Self { flags, power })
    }

    /// Whether the power field was 16 bits wide.
    pub fn is_u16(&self) -> bool {
        self.flags & FLAG_POWER_U16 != 0
    }
}
