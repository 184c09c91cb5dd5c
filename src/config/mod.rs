pub mod settings;
pub mod shared;
pub mod store;

pub use settings::{
    validate_window, AcquisitionSettings, MeterSettings, ReductionSettings, MAX_WINDOW_MS,
};
pub use shared::{ConfigSnapshot, MeterConfig, SharedConfig};
pub use store::MeterStore;
