use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::channel::{sample_channel, Acquired, PushOutcome, SampleReceiver, SampleSender};
use super::state::AcquisitionState;
use crate::config::AcquisitionSettings;
use crate::error::{HardwareError, MeterError, Result};
use crate::hal::{validate_bus_clock, SensorInfo, SensorSource};
use crate::observability::AcquisitionMetrics;

type SharedSensor = Arc<Mutex<Box<dyn SensorSource>>>;

/// Polls the sensor on a dedicated thread and feeds a drop-oldest channel.
///
/// The worker never blocks on the consumer. A hardware error ends the run:
/// the state becomes `Faulted`, the error is pushed after the last good
/// sample, and nothing touches the bus again until the fault is acknowledged.
pub struct AcquisitionPipeline {
    sensor: SharedSensor,
    sender: Arc<SampleSender>,
    state: Arc<Mutex<AcquisitionState>>,
    metrics: Arc<AcquisitionMetrics>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    bus_timeout: Duration,
    info: SensorInfo,
    max_bus_clock_hz: u32,
}

impl AcquisitionPipeline {
    /// Build the pipeline and the receiving end of its sample channel. The
    /// configured bus clock is validated and applied before anything runs.
    pub fn new(
        mut sensor: Box<dyn SensorSource>,
        settings: &AcquisitionSettings,
        metrics: Arc<AcquisitionMetrics>,
    ) -> Result<(Self, SampleReceiver)> {
        let max_bus_clock_hz = sensor.max_bus_clock_hz();
        let clock = validate_bus_clock(settings.bus_clock_hz, max_bus_clock_hz)?;
        sensor.set_bus_clock_hz(clock)?;

        let info = sensor.info();
        let (sender, receiver) = sample_channel(settings.channel_capacity);

        let pipeline = Self {
            sensor: Arc::new(Mutex::new(sensor)),
            sender: Arc::new(sender),
            state: Arc::new(Mutex::new(AcquisitionState::Idle)),
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            bus_timeout: Duration::from_millis(settings.bus_timeout_ms),
            info,
            max_bus_clock_hz,
        };
        Ok((pipeline, receiver))
    }

    pub fn state(&self) -> AcquisitionState {
        self.state.lock().clone()
    }

    /// Shared view of the run state for the reduction side
    pub fn state_handle(&self) -> Arc<Mutex<AcquisitionState>> {
        self.state.clone()
    }

    pub fn sensor_info(&self) -> &SensorInfo {
        &self.info
    }

    pub fn bus_clock_hz(&self) -> u32 {
        self.sensor.lock().bus_clock_hz()
    }

    pub fn metrics(&self) -> &Arc<AcquisitionMetrics> {
        &self.metrics
    }

    /// Begin polling. Refused while running or faulted.
    pub fn start(&mut self) -> Result<()> {
        if !self.state.lock().is_running() {
            // A previous run may have ended on its own (consumer gone)
            self.reap_worker();
        }
        {
            let mut state = self.state.lock();
            let target = AcquisitionState::running();
            if !state.can_transition_to(&target) {
                return Err(MeterError::InvalidState {
                    from: state.name(),
                    to: target.name(),
                });
            }
            *state = target;
        }

        self.stop.store(false, Ordering::Release);

        let worker = Worker {
            sensor: self.sensor.clone(),
            sender: self.sender.clone(),
            state: self.state.clone(),
            metrics: self.metrics.clone(),
            stop: self.stop.clone(),
            bus_timeout: self.bus_timeout,
        };

        let handle = thread::Builder::new()
            .name("rf-acquisition".to_string())
            .spawn(move || worker.run());

        match handle {
            Ok(handle) => {
                self.worker = Some(handle);
                info!(sensor = %self.info.name, "acquisition started");
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = AcquisitionState::Idle;
                Err(HardwareError::Transport(format!("failed to spawn acquisition thread: {}", e))
                    .into())
            }
        }
    }

    /// Stop polling and wait for the worker to exit. The transaction in
    /// flight is allowed to finish; once this returns no further bus
    /// transaction will be issued. A fault stays recorded.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.reap_worker();

        let mut state = self.state.lock();
        if state.is_running() {
            *state = AcquisitionState::Idle;
            info!("acquisition stopped");
        }
    }

    /// Clear a recorded fault, returning to `Idle`
    pub fn acknowledge_fault(&mut self) -> Result<HardwareError> {
        self.reap_worker();

        let mut state = self.state.lock();
        match state.fault().cloned() {
            Some(fault) => {
                *state = AcquisitionState::Idle;
                info!(%fault, "fault acknowledged");
                Ok(fault)
            }
            None => Err(MeterError::InvalidState {
                from: state.name(),
                to: AcquisitionState::Idle.name(),
            }),
        }
    }

    /// Stop (or acknowledge a fault) and start again
    pub fn restart(&mut self) -> Result<()> {
        if self.state.lock().fault().is_some() {
            self.acknowledge_fault()?;
        } else {
            self.stop();
        }
        self.start()
    }

    /// Change the bus clock. While running the change lands between two
    /// transactions.
    pub fn set_bus_clock_hz(&self, hz: u32) -> Result<()> {
        let hz = validate_bus_clock(hz, self.max_bus_clock_hz)?;
        self.sensor.lock().set_bus_clock_hz(hz)?;
        info!(hz, "bus clock changed");
        Ok(())
    }

    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("acquisition worker panicked");
                self.metrics.record_hardware_error();
                *self.state.lock() = AcquisitionState::Faulted {
                    error: HardwareError::Transport("acquisition worker panicked".to_string()),
                };
            }
        }
    }
}

impl Drop for AcquisitionPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    sensor: SharedSensor,
    sender: Arc<SampleSender>,
    state: Arc<Mutex<AcquisitionState>>,
    metrics: Arc<AcquisitionMetrics>,
    stop: Arc<AtomicBool>,
    bus_timeout: Duration,
}

impl Worker {
    fn run(self) {
        let mut overflowing = false;

        while !self.stop.load(Ordering::Acquire) {
            let result = {
                let mut sensor = self.sensor.lock();
                let began = Instant::now();
                let result = sensor.read_raw();
                let elapsed = began.elapsed();
                match result {
                    Ok(_) if elapsed > self.bus_timeout => Err(HardwareError::Timeout(elapsed)),
                    other => other,
                }
            };

            let sample = match result {
                Ok(sample) => sample,
                Err(fault) => {
                    self.fault(fault);
                    return;
                }
            };

            self.metrics.record_sample();
            match self.sender.push(Acquired::Sample(sample)) {
                Ok(PushOutcome::Sent) => overflowing = false,
                Ok(PushOutcome::DroppedOldest) => {
                    self.metrics.record_dropped();
                    if !overflowing {
                        warn!("sample channel full, dropping oldest samples");
                        overflowing = true;
                    }
                }
                Err(_) => {
                    debug!("sample consumer went away");
                    let mut state = self.state.lock();
                    if state.is_running() {
                        *state = AcquisitionState::Idle;
                    }
                    return;
                }
            }
        }
    }

    fn fault(&self, fault: HardwareError) {
        error!(%fault, "acquisition halted on hardware fault");
        *self.state.lock() = AcquisitionState::Faulted {
            error: fault.clone(),
        };
        self.metrics.record_hardware_error();
        let _ = self.sender.push(Acquired::Fault(fault));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::SimulatedSensor;

    fn pipeline(sensor: SimulatedSensor) -> (AcquisitionPipeline, SampleReceiver) {
        AcquisitionPipeline::new(
            Box::new(sensor),
            &AcquisitionSettings::default(),
            Arc::new(AcquisitionMetrics::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_start_twice_is_refused() {
        let (mut pipeline, _rx) = pipeline(SimulatedSensor::constant(2000));
        pipeline.start().unwrap();
        assert!(matches!(
            pipeline.start(),
            Err(MeterError::InvalidState { from: "Running", .. })
        ));
        pipeline.stop();
        assert_eq!(pipeline.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_acknowledge_without_fault_is_refused() {
        let (mut pipeline, _rx) = pipeline(SimulatedSensor::constant(2000));
        assert!(pipeline.acknowledge_fault().is_err());
    }

    #[test]
    fn test_unsupported_clock_rejected() {
        let (pipeline, _rx) = pipeline(SimulatedSensor::constant(2000));
        assert!(pipeline.set_bus_clock_hz(1_000_000).is_err());
        pipeline.set_bus_clock_hz(976_000).unwrap();
        assert_eq!(pipeline.bus_clock_hz(), 976_000);
    }
}
