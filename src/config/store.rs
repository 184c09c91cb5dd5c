use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::shared::MeterConfig;
use crate::calibration::{CalibrationTable, Device, DeviceChain};

/// Persists the calibration table and device records as JSON files:
/// `calibration.json` plus one `devices/<id>.json` per device.
pub struct MeterStore {
    storage_dir: PathBuf,
}

impl MeterStore {
    /// Create new store, creating its directories if needed
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(storage_dir.join("devices"))
            .context("Failed to create meter storage directory")?;

        Ok(Self { storage_dir })
    }

    pub fn save_calibration(&self, table: &CalibrationTable) -> Result<()> {
        let path = self.calibration_path();
        let json =
            serde_json::to_string_pretty(table).context("Failed to serialize calibration table")?;
        fs::write(&path, json).context(format!("Failed to write calibration to {:?}", path))?;
        Ok(())
    }

    /// Load the calibration table; an absent file is an empty table
    pub fn load_calibration(&self) -> Result<CalibrationTable> {
        let path = self.calibration_path();
        if !path.exists() {
            return Ok(CalibrationTable::new());
        }
        let json = fs::read_to_string(&path)
            .context(format!("Failed to read calibration from {:?}", path))?;
        let table: CalibrationTable =
            serde_json::from_str(&json).context("Failed to deserialize calibration table")?;
        Ok(table)
    }

    pub fn save_device(&self, device: &Device) -> Result<()> {
        let path = self.device_path(&device.id);
        let json = serde_json::to_string_pretty(device).context("Failed to serialize device")?;
        fs::write(&path, json).context(format!("Failed to write device to {:?}", path))?;
        Ok(())
    }

    pub fn load_device(&self, id: &str) -> Result<Device> {
        let path = self.device_path(id);
        let json =
            fs::read_to_string(&path).context(format!("Failed to read device from {:?}", path))?;
        let device: Device =
            serde_json::from_str(&json).context("Failed to deserialize device")?;
        Ok(device)
    }

    pub fn delete_device(&self, id: &str) -> Result<()> {
        let path = self.device_path(id);
        if path.exists() {
            fs::remove_file(&path).context(format!("Failed to delete device at {:?}", path))?;
        }
        Ok(())
    }

    /// All readable device records, ordered by id
    pub fn list_devices(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        let dir = self.storage_dir.join("devices");

        if !dir.exists() {
            return Ok(devices);
        }

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let json = fs::read_to_string(&path)?;
                match serde_json::from_str::<Device>(&json) {
                    Ok(device) => devices.push(device),
                    Err(e) => tracing::warn!("Skipping unreadable device file {:?}: {}", path, e),
                }
            }
        }

        devices.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(devices)
    }

    /// Assemble a configuration snapshot from everything on disk
    pub fn load_config(&self, frequency_hz: f64) -> Result<MeterConfig> {
        let config = MeterConfig::new(frequency_hz)
            .with_calibration(self.load_calibration()?)
            .with_devices(DeviceChain::from_devices(self.list_devices()?));
        config.validate()?;
        Ok(config)
    }

    /// Write a whole configuration, removing device files no longer present
    pub fn save_config(&self, config: &MeterConfig) -> Result<()> {
        self.save_calibration(&config.calibration)?;
        for stored in self.list_devices()? {
            if config.devices.get(&stored.id).is_none() {
                self.delete_device(&stored.id)?;
            }
        }
        for device in config.devices.devices() {
            self.save_device(device)?;
        }
        Ok(())
    }

    fn calibration_path(&self) -> PathBuf {
        self.storage_dir.join("calibration.json")
    }

    fn device_path(&self, id: &str) -> PathBuf {
        self.storage_dir.join("devices").join(format!("{}.json", id))
    }
}
