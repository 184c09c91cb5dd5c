use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::MeterError;

/// Raw detector output as clocked out of the ADC
pub type AdcCode = u16;

/// One conversion from the sensor. Ephemeral: consumed once by the reducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub code: AdcCode,
    pub timestamp: Instant,
}

impl RawSample {
    pub fn new(code: AdcCode) -> Self {
        Self {
            code,
            timestamp: Instant::now(),
        }
    }

    pub fn at(code: AdcCode, timestamp: Instant) -> Self {
        Self { code, timestamp }
    }
}

/// Static description of a sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub name: String,
    pub resolution_bits: u8,
}

impl SensorInfo {
    pub fn max_code(&self) -> AdcCode {
        ((1u32 << self.resolution_bits.min(16)) - 1) as AdcCode
    }
}

/// SPI clock rates the Linux spidev driver accepts on the Raspberry Pi
/// (core clock divided by powers of two).
pub const SUPPORTED_BUS_CLOCKS_HZ: [u32; 13] = [
    7_629, 15_200, 30_500, 61_000, 122_000, 244_000, 488_000, 976_000, 1_953_000, 3_900_000,
    7_800_000, 15_600_000, 31_200_000,
];

pub const DEFAULT_BUS_CLOCK_HZ: u32 = 1_953_000;

/// Check a requested bus clock against the supported dividers and the part limit.
pub fn validate_bus_clock(hz: u32, part_max_hz: u32) -> Result<u32, MeterError> {
    if !SUPPORTED_BUS_CLOCKS_HZ.contains(&hz) {
        return Err(MeterError::Configuration(format!(
            "bus clock {} Hz is not a supported divider (expected one of {:?})",
            hz, SUPPORTED_BUS_CLOCKS_HZ
        )));
    }
    if hz > part_max_hz {
        return Err(MeterError::Configuration(format!(
            "bus clock {} Hz exceeds sensor maximum of {} Hz",
            hz, part_max_hz
        )));
    }
    Ok(hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_code_for_12_bit() {
        let info = SensorInfo {
            name: "AD7887".to_string(),
            resolution_bits: 12,
        };
        assert_eq!(info.max_code(), 4095);
    }

    #[test]
    fn test_validate_bus_clock() {
        assert_eq!(validate_bus_clock(1_953_000, 2_000_000), Ok(1_953_000));
        assert!(matches!(
            validate_bus_clock(3_900_000, 2_000_000),
            Err(MeterError::Configuration(_))
        ));
        assert!(matches!(
            validate_bus_clock(1_000_000, u32::MAX),
            Err(MeterError::Configuration(_))
        ));
    }
}
