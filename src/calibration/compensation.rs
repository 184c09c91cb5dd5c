use super::chain::DeviceChain;
use super::table::CalibrationTable;
use crate::config::{ConfigSnapshot, SharedConfig};
use crate::error::Result;
use crate::hal::AdcCode;
use std::sync::Arc;

/// Sensor-side and chain-corrected power for one code
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    /// Power at the detector input
    pub sensor_power_dbm: f64,
    /// Power at the RF input, ahead of the device chain
    pub rf_power_dbm: f64,
}

/// Calibration and chain loss resolved for one frequency.
///
/// Resolving does the interpolation work; applying it to a code is the affine
/// `((code - intercept) / slope) + chain_loss`, so one resolve serves a whole
/// reduction window.
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    pub frequency_hz: f64,
    pub slope: f64,
    pub intercept: f64,
    pub chain_loss_db: f64,
    pub calibration_in_range: bool,
    pub uncalibrated_devices: Vec<String>,
    pub out_of_range_devices: Vec<String>,
}

impl Compensation {
    pub fn resolve(
        table: &CalibrationTable,
        chain: &DeviceChain,
        frequency_hz: f64,
    ) -> Result<Self> {
        let lookup = table.lookup(frequency_hz)?;
        let loss = chain.total_loss(frequency_hz);
        Ok(Self {
            frequency_hz,
            slope: lookup.slope,
            intercept: lookup.intercept,
            chain_loss_db: loss.total_db,
            calibration_in_range: lookup.in_range,
            uncalibrated_devices: loss.uncalibrated,
            out_of_range_devices: loss.out_of_range,
        })
    }

    /// Detector-side power. Takes `f64` so averaged codes can be passed through.
    pub fn sensor_power_dbm(&self, code: f64) -> f64 {
        (code - self.intercept) / self.slope
    }

    pub fn rf_power_dbm(&self, code: f64) -> f64 {
        self.sensor_power_dbm(code) + self.chain_loss_db
    }

    pub fn apply(&self, code: f64) -> PowerReading {
        let sensor_power_dbm = self.sensor_power_dbm(code);
        PowerReading {
            sensor_power_dbm,
            rf_power_dbm: sensor_power_dbm + self.chain_loss_db,
        }
    }
}

/// One-shot conversion of a raw code against an explicit table and chain
pub fn compute_power(
    table: &CalibrationTable,
    chain: &DeviceChain,
    raw_code: AdcCode,
    frequency_hz: f64,
) -> Result<PowerReading> {
    Ok(Compensation::resolve(table, chain, frequency_hz)?.apply(raw_code as f64))
}

struct Cached {
    version: u64,
    frequency_bits: u64,
    compensation: Arc<Compensation>,
}

/// Converts codes against the live shared configuration.
///
/// The resolved compensation is cached per (configuration version, frequency);
/// any edit to calibration, devices or target frequency publishes a new
/// version and so invalidates it.
pub struct CompensationEngine {
    config: SharedConfig,
    cache: Option<Cached>,
}

impl CompensationEngine {
    pub fn new(config: SharedConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Compensation for an explicit frequency against the current snapshot
    pub fn resolve(&mut self, frequency_hz: f64) -> Result<Arc<Compensation>> {
        let snapshot = self.config.snapshot();
        self.resolve_in(&snapshot, frequency_hz)
    }

    /// Compensation at the configured measurement frequency
    pub fn resolve_current(&mut self) -> Result<Arc<Compensation>> {
        let snapshot = self.config.snapshot();
        let frequency_hz = snapshot.config.frequency_hz;
        self.resolve_in(&snapshot, frequency_hz)
    }

    pub fn compute_power(&mut self, raw_code: AdcCode, frequency_hz: f64) -> Result<PowerReading> {
        Ok(self.resolve(frequency_hz)?.apply(raw_code as f64))
    }

    fn resolve_in(
        &mut self,
        snapshot: &ConfigSnapshot,
        frequency_hz: f64,
    ) -> Result<Arc<Compensation>> {
        let frequency_bits = frequency_hz.to_bits();
        if let Some(cached) = &self.cache {
            if cached.version == snapshot.version && cached.frequency_bits == frequency_bits {
                return Ok(cached.compensation.clone());
            }
        }
        let compensation = Arc::new(Compensation::resolve(
            &snapshot.config.calibration,
            &snapshot.config.devices,
            frequency_hz,
        )?);
        self.cache = Some(Cached {
            version: snapshot.version,
            frequency_bits,
            compensation: compensation.clone(),
        });
        Ok(compensation)
    }
}
