use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the acquisition thread, the reduction worker and
/// whoever wants to report on them.
#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    samples_acquired: AtomicU64,
    samples_dropped: AtomicU64,
    hardware_errors: AtomicU64,
    readings_published: AtomicU64,
    compensation_failures: AtomicU64,
    // f64 bit pattern
    achieved_rate_bits: AtomicU64,
}

/// Point-in-time copy of [`AcquisitionMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricsSnapshot {
    pub samples_acquired: u64,
    pub samples_dropped: u64,
    pub hardware_errors: u64,
    pub readings_published: u64,
    pub compensation_failures: u64,
    pub achieved_rate: f64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples_acquired(&self) -> u64 {
        self.samples_acquired.load(Ordering::Relaxed)
    }

    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }

    pub fn hardware_errors(&self) -> u64 {
        self.hardware_errors.load(Ordering::Relaxed)
    }

    pub fn readings_published(&self) -> u64 {
        self.readings_published.load(Ordering::Relaxed)
    }

    pub fn compensation_failures(&self) -> u64 {
        self.compensation_failures.load(Ordering::Relaxed)
    }

    /// Samples per second measured at the most recent reduction
    pub fn achieved_rate(&self) -> f64 {
        f64::from_bits(self.achieved_rate_bits.load(Ordering::Relaxed))
    }

    pub fn record_sample(&self) {
        self.samples_acquired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hardware_error(&self) {
        self.hardware_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reading(&self) {
        self.readings_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compensation_failure(&self) {
        self.compensation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_achieved_rate(&self, rate: f64) {
        self.achieved_rate_bits
            .store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_acquired: self.samples_acquired(),
            samples_dropped: self.samples_dropped(),
            hardware_errors: self.hardware_errors(),
            readings_published: self.readings_published(),
            compensation_failures: self.compensation_failures(),
            achieved_rate: self.achieved_rate(),
        }
    }
}
