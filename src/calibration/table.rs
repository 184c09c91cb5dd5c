use serde::{Deserialize, Serialize};

use super::interpolate::{interpolate, locate, Position};
use crate::error::{MeterError, Result};
use crate::hal::AdcCode;

/// Linear detector model at one frequency: `dBm = (code - intercept) / slope`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub frequency_hz: f64,
    /// ADC codes per dB; negative for log detectors whose output falls with power
    pub slope: f64,
    /// ADC code at 0 dBm
    pub intercept: f64,
    /// Operator's note on how the calibration was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
}

impl CalibrationPoint {
    /// Derive slope and intercept from readings at two known input levels.
    ///
    /// Codes are `None` until the operator has measured them.
    pub fn from_two_point(
        frequency_hz: f64,
        cal_high_dbm: f64,
        cal_low_dbm: f64,
        code_high: Option<AdcCode>,
        code_low: Option<AdcCode>,
    ) -> Result<Self> {
        validate_frequency(frequency_hz)?;
        if !cal_high_dbm.is_finite() || !cal_low_dbm.is_finite() {
            return Err(MeterError::Calibration(
                "reference levels must be finite".to_string(),
            ));
        }
        if cal_high_dbm == cal_low_dbm {
            return Err(MeterError::Calibration(format!(
                "reference levels are identical ({} dBm)",
                cal_high_dbm
            )));
        }
        let code_high = code_high
            .ok_or_else(|| MeterError::Calibration("high reference code not measured".to_string()))?;
        let code_low = code_low
            .ok_or_else(|| MeterError::Calibration("low reference code not measured".to_string()))?;
        if code_high == code_low {
            return Err(MeterError::Calibration(format!(
                "detector gave the same code ({}) at both reference levels",
                code_high
            )));
        }

        let slope = (code_high as f64 - code_low as f64) / (cal_high_dbm - cal_low_dbm);
        let intercept = code_high as f64 - slope * cal_high_dbm;

        Ok(Self {
            frequency_hz,
            slope,
            intercept,
            quality: None,
        })
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    fn validate(&self) -> Result<()> {
        validate_frequency(self.frequency_hz)?;
        if !self.slope.is_finite() || self.slope == 0.0 {
            return Err(MeterError::Calibration(format!(
                "slope at {} Hz must be finite and non-zero",
                self.frequency_hz
            )));
        }
        if !self.intercept.is_finite() {
            return Err(MeterError::Calibration(format!(
                "intercept at {} Hz must be finite",
                self.frequency_hz
            )));
        }
        Ok(())
    }
}

fn validate_frequency(frequency_hz: f64) -> Result<()> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(MeterError::Calibration(format!(
            "frequency must be positive, got {}",
            frequency_hz
        )));
    }
    Ok(())
}

/// Slope and intercept resolved for a target frequency
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationLookup {
    pub slope: f64,
    pub intercept: f64,
    /// False when the frequency lay outside the calibrated span and the edge
    /// point was used instead
    pub in_range: bool,
}

/// Calibration points kept unique and ascending by frequency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CalibrationPoint>", into = "Vec<CalibrationPoint>")]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<CalibrationPoint>) -> Result<Self> {
        let mut table = Self::new();
        for point in points {
            table.insert(point)?;
        }
        Ok(table)
    }

    /// Compute a point from a two-point measurement and store it, replacing any
    /// point at the same frequency. On error the table is unchanged.
    pub fn add_or_update(
        &mut self,
        frequency_hz: f64,
        cal_high_dbm: f64,
        cal_low_dbm: f64,
        code_high: Option<AdcCode>,
        code_low: Option<AdcCode>,
    ) -> Result<&CalibrationPoint> {
        let point = CalibrationPoint::from_two_point(
            frequency_hz,
            cal_high_dbm,
            cal_low_dbm,
            code_high,
            code_low,
        )?;
        self.insert(point)
    }

    /// Store a precomputed point, keeping the quality note of any point it replaces
    /// unless the new one carries its own.
    pub fn insert(&mut self, mut point: CalibrationPoint) -> Result<&CalibrationPoint> {
        point.validate()?;
        let frequencies = self.frequencies();
        let idx = match locate(&frequencies, point.frequency_hz) {
            Position::Exact(i) => {
                if point.quality.is_none() {
                    point.quality = self.points[i].quality.take();
                }
                self.points[i] = point;
                i
            }
            _ => {
                let i = frequencies.partition_point(|&f| f < point.frequency_hz);
                self.points.insert(i, point);
                i
            }
        };
        Ok(&self.points[idx])
    }

    pub fn remove(&mut self, frequency_hz: f64) -> Option<CalibrationPoint> {
        let idx = self
            .points
            .iter()
            .position(|p| p.frequency_hz == frequency_hz)?;
        Some(self.points.remove(idx))
    }

    /// Slope and intercept at `frequency_hz`, interpolated independently
    /// between the bracketing points.
    pub fn lookup(&self, frequency_hz: f64) -> Result<CalibrationLookup> {
        if self.points.len() < 2 {
            return Err(MeterError::InsufficientCalibration {
                available: self.points.len(),
            });
        }
        let frequencies = self.frequencies();
        let slopes: Vec<f64> = self.points.iter().map(|p| p.slope).collect();
        let intercepts: Vec<f64> = self.points.iter().map(|p| p.intercept).collect();

        let slope = interpolate(&frequencies, &slopes, frequency_hz);
        let intercept = interpolate(&frequencies, &intercepts, frequency_hz);

        Ok(CalibrationLookup {
            slope: slope.value,
            intercept: intercept.value,
            in_range: slope.in_range,
        })
    }

    /// The stored point nearest to `frequency_hz`, if any
    pub fn nearest(&self, frequency_hz: f64) -> Option<&CalibrationPoint> {
        self.points.iter().min_by(|a, b| {
            (a.frequency_hz - frequency_hz)
                .abs()
                .total_cmp(&(b.frequency_hz - frequency_hz).abs())
        })
    }

    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn frequencies(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.frequency_hz).collect()
    }
}

impl TryFrom<Vec<CalibrationPoint>> for CalibrationTable {
    type Error = MeterError;

    fn try_from(points: Vec<CalibrationPoint>) -> Result<Self> {
        Self::from_points(points)
    }
}

impl From<CalibrationTable> for Vec<CalibrationPoint> {
    fn from(table: CalibrationTable) -> Self {
        table.points
    }
}
