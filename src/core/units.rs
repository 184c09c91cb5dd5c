use serde::{Deserialize, Serialize};
use std::fmt;

pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

pub fn watts_to_dbm(watts: f64) -> f64 {
    10.0 * watts.log10() + 30.0
}

/// Display units, one per 30 dB decade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PowerUnit {
    PicoWatt,
    NanoWatt,
    MicroWatt,
    MilliWatt,
    Watt,
    KiloWatt,
}

impl PowerUnit {
    pub const ALL: [PowerUnit; 6] = [
        PowerUnit::PicoWatt,
        PowerUnit::NanoWatt,
        PowerUnit::MicroWatt,
        PowerUnit::MilliWatt,
        PowerUnit::Watt,
        PowerUnit::KiloWatt,
    ];

    /// dBm level equal to one of this unit
    pub fn reference_dbm(self) -> f64 {
        match self {
            PowerUnit::PicoWatt => -90.0,
            PowerUnit::NanoWatt => -60.0,
            PowerUnit::MicroWatt => -30.0,
            PowerUnit::MilliWatt => 0.0,
            PowerUnit::Watt => 30.0,
            PowerUnit::KiloWatt => 60.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            PowerUnit::PicoWatt => "pW",
            PowerUnit::NanoWatt => "nW",
            PowerUnit::MicroWatt => "uW",
            PowerUnit::MilliWatt => "mW",
            PowerUnit::Watt => "W",
            PowerUnit::KiloWatt => "kW",
        }
    }

    /// Largest unit whose reference level does not exceed `dbm`. Anything below
    /// 1 pW stays in picowatts.
    pub fn for_dbm(dbm: f64) -> PowerUnit {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|unit| dbm >= unit.reference_dbm())
            .unwrap_or(PowerUnit::PicoWatt)
    }
}

impl fmt::Display for PowerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A power level autoranged into a display unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledPower {
    pub value: f64,
    pub unit: PowerUnit,
}

impl ScaledPower {
    /// `None` for non-finite input
    pub fn from_dbm(dbm: f64) -> Option<Self> {
        if !dbm.is_finite() {
            return None;
        }
        let unit = PowerUnit::for_dbm(dbm);
        Some(Self {
            value: 10f64.powf((dbm - unit.reference_dbm()) / 10.0),
            unit,
        })
    }
}

impl fmt::Display for ScaledPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} {}", self.value, self.unit)
    }
}
