pub mod drivers;
pub mod mock;
pub mod traits;
pub mod types;

pub use traits::SensorSource;
pub use types::{
    validate_bus_clock, AdcCode, RawSample, SensorInfo, DEFAULT_BUS_CLOCK_HZ,
    SUPPORTED_BUS_CLOCKS_HZ,
};
