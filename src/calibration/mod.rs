pub mod chain;
pub mod compensation;
pub mod interpolate;
pub mod table;

pub use chain::{ChainLoss, Device, DeviceChain, DeviceLoss, LossSample};
pub use compensation::{compute_power, Compensation, CompensationEngine, PowerReading};
pub use table::{CalibrationLookup, CalibrationPoint, CalibrationTable};
