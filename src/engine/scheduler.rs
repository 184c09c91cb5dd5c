use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::channel::{Acquired, SampleReceiver};
use super::reduction::ReductionController;
use super::state::AcquisitionState;
use crate::calibration::CompensationEngine;
use crate::config::{ReductionSettings, SharedConfig};
use crate::core::{Diagnostics, MeterEvent, ReductionMode};
use crate::error::{MeterError, Result};
use crate::observability::AcquisitionMetrics;

const DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(1);

/// Control messages for a running [`ReductionWorker`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReductionCommand {
    ResetPeak,
    SetMode(ReductionMode),
    SetWindow(Duration),
    Shutdown,
}

/// Consumer side of the meter: drains acquired samples, reduces them on each
/// tick and publishes the results.
///
/// `tick` does one round without any runtime; `run` drives it from a tokio
/// interval and serves commands in between.
pub struct ReductionWorker {
    receiver: SampleReceiver,
    reducer: ReductionController,
    compensation: CompensationEngine,
    events: broadcast::Sender<MeterEvent>,
    metrics: Arc<AcquisitionMetrics>,
    acquisition_state: Arc<Mutex<AcquisitionState>>,
    last_failure: Option<MeterError>,
    last_diagnostics: Option<Instant>,
}

impl ReductionWorker {
    pub fn new(
        receiver: SampleReceiver,
        settings: &ReductionSettings,
        config: SharedConfig,
        events: broadcast::Sender<MeterEvent>,
        metrics: Arc<AcquisitionMetrics>,
        acquisition_state: Arc<Mutex<AcquisitionState>>,
    ) -> Result<Self> {
        let mut reducer = ReductionController::new(settings)?;
        reducer.mark(Instant::now());

        Ok(Self {
            receiver,
            reducer,
            compensation: CompensationEngine::new(config),
            events,
            metrics,
            acquisition_state,
            last_failure: None,
            last_diagnostics: None,
        })
    }

    pub fn reducer(&self) -> &ReductionController {
        &self.reducer
    }

    /// One reduction round. Returns what was published, in order.
    pub fn tick(&mut self, now: Instant) -> Vec<MeterEvent> {
        let mut published = Vec::new();
        let mut fault = None;

        let run_start = self.acquisition_state.lock().started_at();
        let mut stale = 0usize;
        for item in self.receiver.drain() {
            match item {
                Acquired::Sample(sample) if run_start.map_or(false, |t| sample.timestamp < t) => {
                    stale += 1;
                }
                Acquired::Sample(sample) => self.reducer.ingest(sample),
                Acquired::Fault(error) => fault = Some(error),
            }
        }
        if let Some(start) = run_start {
            self.reducer.discard_before(start);
        }
        if stale > 0 {
            debug!(stale, "discarded samples from a previous run");
        }

        if let Some(summary) = self.reducer.roll(now) {
            self.metrics.set_achieved_rate(summary.rate);

            match self.compensation.resolve_current() {
                Ok(compensation) => {
                    let reading = self.reducer.apply(&summary, &compensation);
                    debug!(
                        power_dbm = reading.power_dbm,
                        samples = reading.samples,
                        rate = reading.sample_rate_achieved,
                        "reduced window"
                    );
                    self.last_failure = None;
                    self.metrics.record_reading();
                    published.push(MeterEvent::Reading(reading));
                }
                Err(error) => {
                    if self.last_failure.as_ref() != Some(&error) {
                        warn!(%error, "cannot compensate readings");
                    }
                    self.last_failure = Some(error.clone());
                    self.metrics.record_compensation_failure();
                    published.push(MeterEvent::CompensationFailed(error));
                }
            }
        } else {
            self.metrics.set_achieved_rate(self.reducer.achieved_rate());
        }

        if let Some(error) = fault {
            published.push(MeterEvent::Fault(error));
        }

        let diagnostics_due = self
            .last_diagnostics
            .map_or(true, |last| now.saturating_duration_since(last) >= DIAGNOSTICS_INTERVAL);
        if diagnostics_due {
            self.last_diagnostics = Some(now);
            published.push(MeterEvent::Diagnostics(self.diagnostics()));
        }

        for event in &published {
            // No subscribers is fine
            let _ = self.events.send(event.clone());
        }
        published
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            sample_rate_achieved: self.metrics.achieved_rate(),
            samples_acquired: self.metrics.samples_acquired(),
            samples_dropped: self.metrics.samples_dropped(),
            faulted: self.acquisition_state.lock().fault().is_some(),
            timestamp: Utc::now(),
        }
    }

    pub fn handle(&mut self, command: ReductionCommand) -> Result<()> {
        match command {
            ReductionCommand::ResetPeak => {
                self.reducer.reset_peak();
                debug!("peak hold reset");
            }
            ReductionCommand::SetMode(mode) => {
                self.reducer.set_mode(mode);
                info!(?mode, "reduction mode changed");
            }
            ReductionCommand::SetWindow(window) => {
                self.reducer.set_window(window)?;
                info!(?window, "reduction window changed");
            }
            ReductionCommand::Shutdown => {}
        }
        Ok(())
    }

    /// Tick every `tick_interval` until shut down or every command sender is gone
    pub async fn run(
        mut self,
        tick_interval: Duration,
        mut commands: mpsc::Receiver<ReductionCommand>,
    ) {
        let mut ticker = tokio::time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
                command = commands.recv() => match command {
                    Some(ReductionCommand::Shutdown) | None => break,
                    Some(command) => {
                        if let Err(e) = self.handle(command) {
                            warn!(error = %e, "reduction command rejected");
                        }
                    }
                },
            }
        }

        debug!("reduction worker stopped");
    }
}
