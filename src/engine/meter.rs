use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::acquisition::AcquisitionPipeline;
use super::scheduler::{ReductionCommand, ReductionWorker};
use super::state::AcquisitionState;
use crate::config::{validate_window, MeterSettings, SharedConfig};
use crate::core::{MeterEvent, ReductionMode};
use crate::error::{HardwareError, MeterError, Result};
use crate::hal::SensorSource;
use crate::observability::{AcquisitionMetrics, MeterMonitor};

const COMMAND_CAPACITY: usize = 32;

/// The power meter as a whole: one acquisition thread feeding one reduction
/// task, with readings published on a broadcast channel.
pub struct PowerMeter {
    acquisition: AcquisitionPipeline,
    config: SharedConfig,
    events: broadcast::Sender<MeterEvent>,
    commands: mpsc::Sender<ReductionCommand>,
    reduction: Option<JoinHandle<()>>,
    metrics: Arc<AcquisitionMetrics>,
}

impl PowerMeter {
    /// Wire the meter up and spawn its reduction task on the current tokio
    /// runtime. Acquisition does not begin until [`PowerMeter::start`].
    pub fn new(
        sensor: Box<dyn SensorSource>,
        config: SharedConfig,
        settings: &MeterSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            MeterError::Configuration(format!("power meter needs a tokio runtime: {}", e))
        })?;

        if config.snapshot().config.frequency_hz != settings.frequency_hz {
            config.set_frequency(settings.frequency_hz)?;
        }

        let metrics = Arc::new(AcquisitionMetrics::new());
        let (acquisition, receiver) =
            AcquisitionPipeline::new(sensor, &settings.acquisition, metrics.clone())?;
        let (events, _) = broadcast::channel(settings.event_capacity);
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let worker = ReductionWorker::new(
            receiver,
            &settings.reduction,
            config.clone(),
            events.clone(),
            metrics.clone(),
            acquisition.state_handle(),
        )?;
        let reduction = runtime.spawn(worker.run(settings.reduction.tick_interval(), command_rx));

        info!(
            sensor = %acquisition.sensor_info().name,
            bus_clock_hz = acquisition.bus_clock_hz(),
            "power meter ready"
        );

        Ok(Self {
            acquisition,
            config,
            events,
            commands,
            reduction: Some(reduction),
            metrics,
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.acquisition.start()
    }

    pub fn stop(&mut self) {
        self.acquisition.stop()
    }

    pub fn restart(&mut self) -> Result<()> {
        self.acquisition.restart()
    }

    /// Clear a sticky hardware fault. Acquisition stays idle afterwards.
    pub fn acknowledge_fault(&mut self) -> Result<HardwareError> {
        self.acquisition.acknowledge_fault()
    }

    pub fn state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MeterEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Retune; the next reduction uses calibration and losses for the new frequency
    pub fn set_frequency(&self, frequency_hz: f64) -> Result<u64> {
        self.config.set_frequency(frequency_hz)
    }

    pub fn set_bus_clock_hz(&self, hz: u32) -> Result<()> {
        self.acquisition.set_bus_clock_hz(hz)
    }

    pub fn bus_clock_hz(&self) -> u32 {
        self.acquisition.bus_clock_hz()
    }

    pub async fn reset_peak(&self) -> Result<()> {
        self.send(ReductionCommand::ResetPeak).await
    }

    pub async fn set_mode(&self, mode: ReductionMode) -> Result<()> {
        self.send(ReductionCommand::SetMode(mode)).await
    }

    pub async fn set_window(&self, window: Duration) -> Result<()> {
        validate_window(window)?;
        self.send(ReductionCommand::SetWindow(window)).await
    }

    pub fn metrics(&self) -> &Arc<AcquisitionMetrics> {
        &self.metrics
    }

    pub fn report(&self) -> String {
        MeterMonitor::new(self.metrics.clone()).generate_report()
    }

    /// Stop acquisition and wait for the reduction task to finish
    pub async fn shutdown(mut self) {
        self.acquisition.stop();
        let _ = self.commands.send(ReductionCommand::Shutdown).await;
        if let Some(handle) = self.reduction.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "reduction task ended abnormally");
            }
        }
        info!("power meter shut down");
    }

    async fn send(&self, command: ReductionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| MeterError::ShutDown)
    }
}
