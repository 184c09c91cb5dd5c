//! Acquisition and calibration core for an RF log-detector power meter.
//!
//! A sensor is polled on its own thread into a drop-oldest channel; a tokio
//! task reduces windows of raw codes and converts them to dBm using a
//! frequency-interpolated calibration table and the insertion loss of the
//! devices in the signal path.

pub mod calibration;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod hal;
pub mod observability;

pub use calibration::{compute_power, CalibrationTable, CompensationEngine, Device, DeviceChain};
pub use config::{MeterConfig, MeterSettings, SharedConfig};
pub use crate::core::{CalibratedReading, MeterEvent, ReductionMode};
pub use engine::{AcquisitionState, PowerMeter};
pub use error::{HardwareError, MeterError};
