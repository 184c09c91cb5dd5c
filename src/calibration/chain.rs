use serde::{Deserialize, Serialize};

use super::interpolate::interpolate;
use crate::error::{MeterError, Result};

/// Insertion loss of a device at one frequency. Loss is positive attenuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossSample {
    pub frequency_hz: f64,
    pub loss_db: f64,
}

impl LossSample {
    pub fn new(frequency_hz: f64, loss_db: f64) -> Self {
        Self {
            frequency_hz,
            loss_db,
        }
    }

    /// From a two-port transmission magnitude (S21 in dB, negative for a lossy part)
    pub fn from_s21_db(frequency_hz: f64, s21_db: f64) -> Self {
        Self::new(frequency_hz, -s21_db)
    }
}

/// Loss a single device contributes at a frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceLoss {
    Calibrated { loss_db: f64, in_range: bool },
    /// Fewer than two samples; contributes nothing
    Uncalibrated,
}

/// Attenuator, coupler or cable in the signal path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DeviceRecord")]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default)]
    samples: Vec<LossSample>,
    #[serde(default)]
    pub in_use: bool,
}

// Stored form; samples are re-sorted on the way in
#[derive(Deserialize)]
struct DeviceRecord {
    id: String,
    name: String,
    #[serde(default)]
    samples: Vec<LossSample>,
    #[serde(default)]
    in_use: bool,
}

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        Device::new(record.id, record.name)
            .with_samples(record.samples)
            .in_use(record.in_use)
    }
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            samples: Vec::new(),
            in_use: false,
        }
    }

    pub fn with_samples(mut self, samples: Vec<LossSample>) -> Self {
        self.set_samples(samples);
        self
    }

    pub fn in_use(mut self, in_use: bool) -> Self {
        self.in_use = in_use;
        self
    }

    /// Replace all samples. Non-finite entries are discarded and a later
    /// sample at an already-present frequency wins.
    pub fn set_samples(&mut self, samples: Vec<LossSample>) {
        let mut samples: Vec<LossSample> = samples
            .into_iter()
            .filter(|s| s.frequency_hz.is_finite() && s.loss_db.is_finite())
            .collect();
        // Stable sort keeps insertion order among equal frequencies
        samples.sort_by(|a, b| a.frequency_hz.total_cmp(&b.frequency_hz));
        let mut deduped: Vec<LossSample> = Vec::with_capacity(samples.len());
        for sample in samples {
            match deduped.last_mut() {
                Some(last) if last.frequency_hz == sample.frequency_hz => *last = sample,
                _ => deduped.push(sample),
            }
        }
        self.samples = deduped;
    }

    pub fn add_sample(&mut self, sample: LossSample) {
        let mut samples = std::mem::take(&mut self.samples);
        samples.push(sample);
        self.set_samples(samples);
    }

    pub fn samples(&self) -> &[LossSample] {
        &self.samples
    }

    pub fn is_calibrated(&self) -> bool {
        self.samples.len() >= 2
    }

    pub fn insertion_loss(&self, frequency_hz: f64) -> DeviceLoss {
        if !self.is_calibrated() {
            return DeviceLoss::Uncalibrated;
        }
        let freqs: Vec<f64> = self.samples.iter().map(|s| s.frequency_hz).collect();
        let losses: Vec<f64> = self.samples.iter().map(|s| s.loss_db).collect();
        let result = interpolate(&freqs, &losses, frequency_hz);
        DeviceLoss::Calibrated {
            loss_db: result.value,
            in_range: result.in_range,
        }
    }

    /// Loss in dB, zero for an uncalibrated device
    pub fn insertion_loss_db(&self, frequency_hz: f64) -> f64 {
        match self.insertion_loss(frequency_hz) {
            DeviceLoss::Calibrated { loss_db, .. } => loss_db,
            DeviceLoss::Uncalibrated => 0.0,
        }
    }
}

/// Summed loss of the in-use devices at one frequency
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainLoss {
    pub total_db: f64,
    /// In-use devices that lack loss data and were counted as 0 dB
    pub uncalibrated: Vec<String>,
    /// In-use devices whose loss was clamped to a table edge
    pub out_of_range: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceChain {
    devices: Vec<Device>,
}

impl DeviceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: Vec<Device>) -> Self {
        let mut chain = Self::new();
        for device in devices {
            chain.upsert(device);
        }
        chain
    }

    /// Add a device, or replace the one with the same id in place
    pub fn upsert(&mut self, device: Device) {
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device,
            None => self.devices.push(device),
        }
    }

    pub fn remove(&mut self, id: &str) -> Result<Device> {
        let idx = self
            .devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| MeterError::UnknownDevice(id.to_string()))?;
        Ok(self.devices.remove(idx))
    }

    pub fn set_in_use(&mut self, id: &str, in_use: bool) -> Result<()> {
        self.get_mut(id)?.in_use = in_use;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut Device> {
        self.devices
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| MeterError::UnknownDevice(id.to_string()))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn in_use(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.in_use)
    }

    pub fn total_loss(&self, frequency_hz: f64) -> ChainLoss {
        let mut chain = ChainLoss::default();
        for device in self.in_use() {
            match device.insertion_loss(frequency_hz) {
                DeviceLoss::Calibrated { loss_db, in_range } => {
                    chain.total_db += loss_db;
                    if !in_range {
                        chain.out_of_range.push(device.id.clone());
                    }
                }
                DeviceLoss::Uncalibrated => chain.uncalibrated.push(device.id.clone()),
            }
        }
        chain
    }

    pub fn total_loss_db(&self, frequency_hz: f64) -> f64 {
        self.total_loss(frequency_hz).total_db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attenuator() -> Device {
        Device::new("att-20", "20 dB pad").with_samples(vec![
            LossSample::new(1e9, 20.5),
            LossSample::new(100e6, 20.0),
        ])
    }

    #[test]
    fn test_samples_sorted() {
        let device = attenuator();
        assert_eq!(device.samples()[0].frequency_hz, 100e6);
    }

    #[test]
    fn test_duplicate_frequency_keeps_latest() {
        let mut device = attenuator();
        device.add_sample(LossSample::new(100e6, 19.8));
        assert_eq!(device.samples().len(), 2);
        assert_eq!(device.samples()[0].loss_db, 19.8);
    }

    #[test]
    fn test_deserialize_sorts_samples() {
        let json = r#"{"id": "c1", "name": "coupler", "in_use": true,
            "samples": [{"frequency_hz": 2e9, "loss_db": 30.4}, {"frequency_hz": 1e9, "loss_db": 30.1}]}"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.samples()[0].frequency_hz, 1e9);
        assert!(device.in_use);
    }

    #[test]
    fn test_from_s21() {
        let sample = LossSample::from_s21_db(1e9, -3.2);
        assert_eq!(sample.loss_db, 3.2);
    }

    #[test]
    fn test_single_sample_device_contributes_nothing() {
        let device = Device::new("cable", "SMA cable")
            .with_samples(vec![LossSample::new(1e9, 0.4)])
            .in_use(true);
        let chain = DeviceChain::from_devices(vec![device]);
        let loss = chain.total_loss(1e9);
        assert_eq!(loss.total_db, 0.0);
        assert_eq!(loss.uncalibrated, vec!["cable".to_string()]);
    }

    #[test]
    fn test_unknown_device() {
        let mut chain = DeviceChain::new();
        assert_eq!(
            chain.set_in_use("nope", true),
            Err(MeterError::UnknownDevice("nope".to_string()))
        );
    }
}
