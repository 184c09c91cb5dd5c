pub mod reading;
pub mod units;

pub use reading::{
    CalibratedReading, Diagnostics, MeterEvent, ReadingWarnings, ReductionMode,
    SENSOR_MAX_INPUT_DBM,
};
pub use units::{dbm_to_watts, watts_to_dbm, PowerUnit, ScaledPower};
