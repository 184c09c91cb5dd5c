use std::sync::Arc;

use super::AcquisitionMetrics;

/// Formats the acquisition counters for logs and the demo binary
pub struct MeterMonitor {
    metrics: Arc<AcquisitionMetrics>,
}

impl MeterMonitor {
    pub fn new(metrics: Arc<AcquisitionMetrics>) -> Self {
        Self { metrics }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.metrics.snapshot();

        if snapshot.samples_acquired == 0 && snapshot.hardware_errors == 0 {
            return "No samples acquired".to_string();
        }

        let drop_pct = if snapshot.samples_acquired > 0 {
            100.0 * snapshot.samples_dropped as f64 / snapshot.samples_acquired as f64
        } else {
            0.0
        };

        let mut report = String::from("=== Meter Metrics ===\n");
        report.push_str(&format!(
            "  Samples: {} acquired, {} dropped ({:.2}%)\n",
            snapshot.samples_acquired, snapshot.samples_dropped, drop_pct
        ));
        report.push_str(&format!(
            "  Achieved rate: {:.0} samples/s\n",
            snapshot.achieved_rate
        ));
        report.push_str(&format!(
            "  Readings: {} published, {}\n",
            snapshot.readings_published,
            plural(snapshot.compensation_failures, "compensation failure")
        ));
        report.push_str(&format!(
            "  Hardware: {}\n",
            plural(snapshot.hardware_errors, "error")
        ));

        report
    }

    pub fn metrics(&self) -> &Arc<AcquisitionMetrics> {
        &self.metrics
    }
}

fn plural(count: u64, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}
