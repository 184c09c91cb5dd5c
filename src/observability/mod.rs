pub mod metrics;
pub mod monitor;

pub use metrics::{AcquisitionMetrics, MetricsSnapshot};
pub use monitor::MeterMonitor;
