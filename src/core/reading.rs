use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::units::{dbm_to_watts, ScaledPower};
use crate::error::{HardwareError, MeterError};

/// AD8318 absolute maximum input level
pub const SENSOR_MAX_INPUT_DBM: f64 = 12.0;

/// How a window of samples becomes one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionMode {
    /// Mean power over the window, in dBm
    #[default]
    Average,
    /// Highest power seen since the last explicit reset
    PeakHold,
}

/// Conditions the display should flag. Values are never clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadingWarnings {
    /// Detector input at or above its absolute maximum rating
    pub sensor_overload: bool,
    /// RF input above 0 dBm
    pub above_zero_dbm: bool,
    /// Calibration clamped to the nearest edge point
    pub calibration_out_of_range: bool,
    /// An in-use device has no loss data and counted as 0 dB
    pub uncalibrated_devices: bool,
    /// A device loss was clamped to its table edge
    pub device_out_of_range: bool,
}

impl ReadingWarnings {
    pub fn any(&self) -> bool {
        self.sensor_overload
            || self.above_zero_dbm
            || self.calibration_out_of_range
            || self.uncalibrated_devices
            || self.device_out_of_range
    }
}

/// One published power value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedReading {
    /// Power at the RF input, corrected for the device chain
    pub power_dbm: f64,
    /// Power at the detector
    pub sensor_power_dbm: f64,
    pub chain_loss_db: f64,
    pub frequency_hz: f64,
    /// Samples per second drained since the previous reduction
    pub sample_rate_achieved: f64,
    /// Samples in the window this reading was reduced from
    pub samples: usize,
    pub mode: ReductionMode,
    pub timestamp: DateTime<Utc>,
    pub warnings: ReadingWarnings,
}

impl CalibratedReading {
    pub fn power_watts(&self) -> f64 {
        dbm_to_watts(self.power_dbm)
    }

    pub fn scaled(&self) -> Option<ScaledPower> {
        ScaledPower::from_dbm(self.power_dbm)
    }
}

/// Periodic health report from the reduction worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub sample_rate_achieved: f64,
    pub samples_acquired: u64,
    pub samples_dropped: u64,
    pub faulted: bool,
    pub timestamp: DateTime<Utc>,
}

/// Everything published to consumers
#[derive(Debug, Clone, PartialEq)]
pub enum MeterEvent {
    Reading(CalibratedReading),
    Diagnostics(Diagnostics),
    /// Acquisition stopped on a bus fault; stays set until acknowledged
    Fault(HardwareError),
    /// A window could not be converted (e.g. too few calibration points)
    CompensationFailed(MeterError),
}
