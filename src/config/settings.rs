use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::core::ReductionMode;
use crate::error::MeterError;
use crate::hal::{DEFAULT_BUS_CLOCK_HZ, SUPPORTED_BUS_CLOCKS_HZ};

/// Longest reduction window the controller will hold
pub const MAX_WINDOW_MS: u64 = 10_000;
/// Upper bound on the transfer channel
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 22;

/// Check a reduction window against `1..=MAX_WINDOW_MS`
pub fn validate_window(window: Duration) -> Result<(), MeterError> {
    let ms = window.as_millis();
    if ms == 0 || ms > MAX_WINDOW_MS as u128 {
        return Err(MeterError::Configuration(format!(
            "reduction window must be 1..={} ms, got {:?}",
            MAX_WINDOW_MS, window
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub bus_clock_hz: u32,
    /// Samples buffered between the acquisition and reduction workers
    pub channel_capacity: usize,
    /// A bus transaction slower than this is a hardware fault
    pub bus_timeout_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            bus_clock_hz: DEFAULT_BUS_CLOCK_HZ,
            channel_capacity: 65_536,
            bus_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionSettings {
    pub mode: ReductionMode,
    pub window_ms: u64,
    /// Consumer refresh period
    pub tick_interval_ms: u64,
    /// Hard cap on samples held in the window regardless of its duration
    pub max_window_samples: usize,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        Self {
            mode: ReductionMode::Average,
            window_ms: 250,
            tick_interval_ms: 50,
            max_window_samples: 1 << 20,
        }
    }
}

impl ReductionSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), MeterError> {
        validate_window(self.window())?;
        if self.tick_interval_ms == 0 || self.tick_interval_ms > MAX_WINDOW_MS {
            return Err(MeterError::Configuration(format!(
                "tick interval must be 1..={} ms, got {}",
                MAX_WINDOW_MS, self.tick_interval_ms
            )));
        }
        if self.max_window_samples == 0 {
            return Err(MeterError::Configuration(
                "max_window_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runtime parameters for a meter session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterSettings {
    pub frequency_hz: f64,
    /// Buffered events per consumer on the publish side
    pub event_capacity: usize,
    pub acquisition: AcquisitionSettings,
    pub reduction: ReductionSettings,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 100e6,
            event_capacity: 256,
            acquisition: AcquisitionSettings::default(),
            reduction: ReductionSettings::default(),
        }
    }
}

impl MeterSettings {
    pub fn validate(&self) -> Result<(), MeterError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(MeterError::Configuration(format!(
                "frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        if self.event_capacity == 0 {
            return Err(MeterError::Configuration(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        let acquisition = &self.acquisition;
        if acquisition.channel_capacity == 0 || acquisition.channel_capacity > MAX_CHANNEL_CAPACITY
        {
            return Err(MeterError::Configuration(format!(
                "channel capacity must be 1..={}, got {}",
                MAX_CHANNEL_CAPACITY, acquisition.channel_capacity
            )));
        }
        if acquisition.bus_timeout_ms == 0 {
            return Err(MeterError::Configuration(
                "bus timeout must be non-zero".to_string(),
            ));
        }
        if !SUPPORTED_BUS_CLOCKS_HZ.contains(&acquisition.bus_clock_hz) {
            return Err(MeterError::Configuration(format!(
                "bus clock {} Hz is not a supported divider",
                acquisition.bus_clock_hz
            )));
        }
        self.reduction.validate()
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition.bus_timeout_ms)
    }

    /// Read settings from `path`, writing defaults there first if it does not exist
    pub async fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create settings directory")?;
            }
            Self::default().save(path).await?;
        }

        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read settings from {:?}", path))?;
        let settings: MeterSettings =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .context("Failed to write temporary settings file")?;
        fs::rename(&temp_path, path)
            .await
            .context("Failed to atomically update settings file")?;
        Ok(())
    }
}
