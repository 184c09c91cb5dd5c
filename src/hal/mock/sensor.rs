use crate::error::HardwareError;
use crate::hal::traits::SensorSource;
use crate::hal::types::{AdcCode, RawSample, SensorInfo, DEFAULT_BUS_CLOCK_HZ};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Waveform {
    Constant(AdcCode),
    /// Replays the codes in order, wrapping around
    Sequence(Vec<AdcCode>),
    /// Triangle sweep between two codes
    Sweep { low: AdcCode, high: AdcCode, step: u16 },
}

/// Software stand-in for the detector, used by tests and the demo binary
pub struct SimulatedSensor {
    waveform: Waveform,
    cursor: usize,
    rising: bool,
    current: AdcCode,
    reads: u64,
    fail_after: Option<(u64, HardwareError)>,
    read_delay: Option<Duration>,
    clock_hz: u32,
}

impl SimulatedSensor {
    fn with_waveform(waveform: Waveform) -> Self {
        let current = match &waveform {
            Waveform::Constant(code) => *code,
            Waveform::Sequence(codes) => codes.first().copied().unwrap_or(0),
            Waveform::Sweep { low, .. } => *low,
        };
        Self {
            waveform,
            cursor: 0,
            rising: true,
            current,
            reads: 0,
            fail_after: None,
            read_delay: None,
            clock_hz: DEFAULT_BUS_CLOCK_HZ,
        }
    }

    pub fn constant(code: AdcCode) -> Self {
        Self::with_waveform(Waveform::Constant(code))
    }

    pub fn sequence(codes: Vec<AdcCode>) -> Self {
        Self::with_waveform(Waveform::Sequence(codes))
    }

    pub fn sweep(low: AdcCode, high: AdcCode, step: u16) -> Self {
        Self::with_waveform(Waveform::Sweep {
            low: low.min(high),
            high: low.max(high),
            step: step.max(1),
        })
    }

    /// Fail every read from the `reads`-th one onwards, like a stuck bus
    pub fn with_fault_after(mut self, reads: u64, error: HardwareError) -> Self {
        self.fail_after = Some((reads, error));
        self
    }

    /// Sleep on each read to model bus transfer time
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn next_code(&mut self) -> AdcCode {
        match &self.waveform {
            Waveform::Constant(code) => *code,
            Waveform::Sequence(codes) => {
                if codes.is_empty() {
                    return 0;
                }
                let code = codes[self.cursor % codes.len()];
                self.cursor = (self.cursor + 1) % codes.len();
                code
            }
            Waveform::Sweep { low, high, step } => {
                let code = self.current;
                if self.rising {
                    self.current = self.current.saturating_add(*step).min(*high);
                    if self.current == *high {
                        self.rising = false;
                    }
                } else {
                    self.current = self.current.saturating_sub(*step).max(*low);
                    if self.current == *low {
                        self.rising = true;
                    }
                }
                code
            }
        }
    }
}

impl SensorSource for SimulatedSensor {
    fn read_raw(&mut self) -> Result<RawSample, HardwareError> {
        if let Some((after, error)) = &self.fail_after {
            if self.reads >= *after {
                return Err(error.clone());
            }
        }
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.reads += 1;
        let code = self.next_code();
        Ok(RawSample::new(code))
    }

    fn bus_clock_hz(&self) -> u32 {
        self.clock_hz
    }

    fn set_bus_clock_hz(&mut self, hz: u32) -> Result<(), HardwareError> {
        self.clock_hz = hz;
        Ok(())
    }

    fn info(&self) -> SensorInfo {
        SensorInfo {
            name: "simulated".to_string(),
            resolution_bits: 12,
        }
    }
}
