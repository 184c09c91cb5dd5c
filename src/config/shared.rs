use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::calibration::{CalibrationPoint, CalibrationTable, Device, DeviceChain};
use crate::error::{MeterError, Result};
use crate::hal::AdcCode;

/// Everything the compensation engine reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Measurement frequency the operator has dialled in
    pub frequency_hz: f64,
    #[serde(default)]
    pub calibration: CalibrationTable,
    #[serde(default)]
    pub devices: DeviceChain,
}

impl MeterConfig {
    pub fn new(frequency_hz: f64) -> Self {
        Self {
            frequency_hz,
            calibration: CalibrationTable::new(),
            devices: DeviceChain::new(),
        }
    }

    pub fn with_calibration(mut self, calibration: CalibrationTable) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_devices(mut self, devices: DeviceChain) -> Self {
        self.devices = devices;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(MeterError::Configuration(format!(
                "measurement frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        Ok(())
    }
}

/// Immutable, versioned view of the configuration
#[derive(Debug)]
pub struct ConfigSnapshot {
    pub version: u64,
    pub config: MeterConfig,
}

/// Configuration shared between the editing surface and the reduction worker.
///
/// Readers take an `Arc` of the whole snapshot; writers build a modified copy
/// and swap it in, so nobody ever sees a half-applied edit.
#[derive(Clone)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<ConfigSnapshot>>>,
    changes: Arc<watch::Sender<u64>>,
}

impl SharedConfig {
    pub fn new(config: MeterConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            current: Arc::new(RwLock::new(Arc::new(ConfigSnapshot { version: 0, config }))),
            changes: Arc::new(changes),
        }
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Notified with the new version after every published change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Apply `edit` to a copy of the configuration and publish it. If the edit
    /// or validation fails, the published configuration is untouched.
    pub fn update<F>(&self, edit: F) -> Result<u64>
    where
        F: FnOnce(&mut MeterConfig) -> Result<()>,
    {
        let mut current = self.current.write();
        let mut next = current.config.clone();
        edit(&mut next)?;
        next.validate()?;
        let version = current.version + 1;
        *current = Arc::new(ConfigSnapshot {
            version,
            config: next,
        });
        drop(current);

        self.changes.send_replace(version);
        debug!(version, "configuration published");
        Ok(version)
    }

    pub fn replace(&self, config: MeterConfig) -> Result<u64> {
        self.update(move |current| {
            *current = config;
            Ok(())
        })
    }

    pub fn set_frequency(&self, frequency_hz: f64) -> Result<u64> {
        self.update(|config| {
            config.frequency_hz = frequency_hz;
            Ok(())
        })
    }

    pub fn add_calibration(
        &self,
        frequency_hz: f64,
        cal_high_dbm: f64,
        cal_low_dbm: f64,
        code_high: Option<AdcCode>,
        code_low: Option<AdcCode>,
    ) -> Result<u64> {
        self.update(|config| {
            config
                .calibration
                .add_or_update(frequency_hz, cal_high_dbm, cal_low_dbm, code_high, code_low)
                .map(|_| ())
        })
    }

    pub fn insert_calibration(&self, point: CalibrationPoint) -> Result<u64> {
        self.update(|config| config.calibration.insert(point).map(|_| ()))
    }

    pub fn remove_calibration(&self, frequency_hz: f64) -> Result<u64> {
        self.update(|config| {
            config.calibration.remove(frequency_hz).map(|_| ()).ok_or_else(|| {
                MeterError::Calibration(format!("no calibration point at {} Hz", frequency_hz))
            })
        })
    }

    pub fn upsert_device(&self, device: Device) -> Result<u64> {
        self.update(|config| {
            config.devices.upsert(device);
            Ok(())
        })
    }

    pub fn set_device_in_use(&self, id: &str, in_use: bool) -> Result<u64> {
        self.update(|config| config.devices.set_in_use(id, in_use))
    }

    pub fn remove_device(&self, id: &str) -> Result<u64> {
        self.update(|config| config.devices.remove(id).map(|_| ()))
    }
}
