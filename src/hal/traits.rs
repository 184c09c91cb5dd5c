use crate::error::HardwareError;
use super::types::{RawSample, SensorInfo};

/// Trait implemented by sensor front-ends that yield raw detector codes
///
/// `read_raw` drives exactly one bus transaction. Implementations must bound
/// the transaction in time and report an overrun as `HardwareError::Timeout`.
/// The acquisition worker also times every call, but only once it returns: a
/// call that never returns stalls the worker, and `AcquisitionPipeline::stop`
/// waits for it. A failed call must leave the source usable for the next
/// call; whether to retry, skip or halt is the caller's decision.
pub trait SensorSource: Send {
    /// Perform one conversion
    fn read_raw(&mut self) -> Result<RawSample, HardwareError>;

    /// Current bus clock in Hz
    fn bus_clock_hz(&self) -> u32;

    /// Change the bus clock. Callers validate the value first.
    fn set_bus_clock_hz(&mut self, hz: u32) -> Result<(), HardwareError>;

    /// Highest clock the part tolerates
    fn max_bus_clock_hz(&self) -> u32 {
        u32::MAX
    }

    fn info(&self) -> SensorInfo;
}
