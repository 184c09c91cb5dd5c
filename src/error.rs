use std::time::Duration;

/// Faults raised by the sensor bus. Fatal to the current acquisition run, not
/// to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HardwareError {
    #[error("sensor bus transaction exceeded {0:?}")]
    Timeout(Duration),
    #[error("sensor bus transport fault: {0}")]
    Transport(String),
    #[error("sensor protocol error: {0}")]
    Protocol(String),
    #[error("sensor disconnected")]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeterError {
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Malformed calibration input, rejected at entry with the table unchanged
    #[error("calibration rejected: {0}")]
    Calibration(String),

    #[error("insufficient calibration: {available} point(s) stored, at least 2 required")]
    InsufficientCalibration { available: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("unknown device '{0}'")]
    UnknownDevice(String),

    #[error("meter has been shut down")]
    ShutDown,

    #[error("invalid state transition: {from} -> {to}")]
    InvalidState {
        from: &'static str,
        to: &'static str,
    },
}

pub type Result<T, E = MeterError> = std::result::Result<T, E>;
