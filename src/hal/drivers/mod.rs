pub mod ad7887;

pub use ad7887::{Ad7887, BusClock, Control, PowerMode};
