use chrono::Utc;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::calibration::Compensation;
use crate::config::{validate_window, ReductionSettings};
use crate::core::{CalibratedReading, ReadingWarnings, ReductionMode, SENSOR_MAX_INPUT_DBM};
use crate::error::Result;
use crate::hal::{AdcCode, RawSample};

/// Code statistics for one window, ready to be compensated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    /// Samples currently in the window
    pub count: usize,
    pub mean_code: f64,
    pub min_code: AdcCode,
    pub max_code: AdcCode,
    /// Samples ingested since the previous roll
    pub drained: usize,
    /// `drained` over the time since the previous roll, in samples/s
    pub rate: f64,
}

/// Strongest reading since the last reset, kept as it was measured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeldPeak {
    pub rf_dbm: f64,
    pub sensor_dbm: f64,
    /// Chain loss in effect when the peak was taken
    pub chain_loss_db: f64,
}

/// Sliding-window reducer.
///
/// Samples are kept for `window` (and at most `max_samples` of them). Each
/// roll evicts expired samples and summarises the rest in code space; the
/// summary is turned into dBm with a single resolved [`Compensation`], which
/// for a fixed configuration is an affine map, so the mean code maps exactly
/// to the mean dBm.
pub struct ReductionController {
    mode: ReductionMode,
    window: Duration,
    max_samples: usize,
    samples: VecDeque<RawSample>,
    drained_since_roll: usize,
    last_roll: Option<Instant>,
    achieved_rate: f64,
    peak: Option<HeldPeak>,
}

impl ReductionController {
    pub fn new(settings: &ReductionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            mode: settings.mode,
            window: settings.window(),
            max_samples: settings.max_window_samples,
            samples: VecDeque::new(),
            drained_since_roll: 0,
            last_roll: None,
            achieved_rate: 0.0,
            peak: None,
        })
    }

    pub fn mode(&self) -> ReductionMode {
        self.mode
    }

    /// Peak hold is tracked in every mode so switching to it shows the
    /// maximum since the last reset.
    pub fn set_mode(&mut self, mode: ReductionMode) {
        self.mode = mode;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_window(&mut self, window: Duration) -> Result<()> {
        validate_window(window)?;
        self.window = window;
        Ok(())
    }

    /// Anchor the rate measurement, e.g. when acquisition starts
    pub fn mark(&mut self, now: Instant) {
        self.last_roll = Some(now);
        self.drained_since_roll = 0;
    }

    pub fn ingest(&mut self, sample: RawSample) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.drained_since_roll += 1;
    }

    pub fn ingest_all(&mut self, samples: impl IntoIterator<Item = RawSample>) {
        for sample in samples {
            self.ingest(sample);
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples per second measured at the most recent roll
    pub fn achieved_rate(&self) -> f64 {
        self.achieved_rate
    }

    pub fn peak_dbm(&self) -> Option<f64> {
        self.peak.map(|p| p.rf_dbm)
    }

    pub fn peak(&self) -> Option<HeldPeak> {
        self.peak
    }

    pub fn reset_peak(&mut self) {
        self.peak = None;
    }

    /// Drop every buffered sample. Peak hold is not affected.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.drained_since_roll = 0;
    }

    /// Drop buffered samples taken before `cutoff`
    pub fn discard_before(&mut self, cutoff: Instant) {
        while self
            .samples
            .front()
            .map_or(false, |s| s.timestamp < cutoff)
        {
            self.samples.pop_front();
        }
    }

    /// Evict expired samples and summarise the window. `None` if it is empty.
    pub fn roll(&mut self, now: Instant) -> Option<WindowSummary> {
        if let Some(cutoff) = now.checked_sub(self.window) {
            self.discard_before(cutoff);
        }

        let drained = std::mem::take(&mut self.drained_since_roll);
        if let Some(previous) = self.last_roll {
            let elapsed = now.saturating_duration_since(previous).as_secs_f64();
            if elapsed > 0.0 {
                self.achieved_rate = drained as f64 / elapsed;
            }
        }
        self.last_roll = Some(now);

        let first = self.samples.front()?.code;
        let (mut sum, mut min_code, mut max_code) = (0u64, first, first);
        for sample in &self.samples {
            sum += sample.code as u64;
            min_code = min_code.min(sample.code);
            max_code = max_code.max(sample.code);
        }

        Some(WindowSummary {
            count: self.samples.len(),
            mean_code: sum as f64 / self.samples.len() as f64,
            min_code,
            max_code,
            drained,
            rate: self.achieved_rate,
        })
    }

    /// Compensate a window summary into a published reading
    pub fn apply(&mut self, summary: &WindowSummary, compensation: &Compensation) -> CalibratedReading {
        // The extreme codes bound the window's power whichever way the slope runs
        let low = compensation.apply(summary.min_code as f64);
        let high = compensation.apply(summary.max_code as f64);
        let strongest = if high.rf_power_dbm > low.rf_power_dbm { high } else { low };
        if self.peak.map_or(true, |held| strongest.rf_power_dbm > held.rf_dbm) {
            self.peak = Some(HeldPeak {
                rf_dbm: strongest.rf_power_dbm,
                sensor_dbm: strongest.sensor_power_dbm,
                chain_loss_db: compensation.chain_loss_db,
            });
        }

        let (power_dbm, sensor_power_dbm, chain_loss_db) = match (self.mode, self.peak) {
            (ReductionMode::PeakHold, Some(held)) => {
                (held.rf_dbm, held.sensor_dbm, held.chain_loss_db)
            }
            _ => {
                let reading = compensation.apply(summary.mean_code);
                (
                    reading.rf_power_dbm,
                    reading.sensor_power_dbm,
                    compensation.chain_loss_db,
                )
            }
        };

        let warnings = ReadingWarnings {
            sensor_overload: sensor_power_dbm >= SENSOR_MAX_INPUT_DBM,
            above_zero_dbm: power_dbm > 0.0,
            calibration_out_of_range: !compensation.calibration_in_range,
            uncalibrated_devices: !compensation.uncalibrated_devices.is_empty(),
            device_out_of_range: !compensation.out_of_range_devices.is_empty(),
        };

        CalibratedReading {
            power_dbm,
            sensor_power_dbm,
            chain_loss_db,
            frequency_hz: compensation.frequency_hz,
            sample_rate_achieved: summary.rate,
            samples: summary.count,
            mode: self.mode,
            timestamp: Utc::now(),
            warnings,
        }
    }
}
