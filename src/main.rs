use anyhow::{Context, Result};
use rfmeter::calibration::{CalibrationTable, Device, DeviceChain, LossSample};
use rfmeter::config::{MeterConfig, MeterSettings, MeterStore, SharedConfig};
use rfmeter::core::{MeterEvent, ReductionMode};
use rfmeter::hal::mock::SimulatedSensor;
use rfmeter::PowerMeter;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Usage: rfmeter [settings.json] [storage-dir]
///
/// Runs the meter against a simulated detector sweeping the full code range.
/// Calibration and devices come from `storage-dir` when given, otherwise a
/// built-in two-point calibration with a 10 dB pad is used.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => MeterSettings::load_or_create(&path).await?,
        None => MeterSettings::default(),
    };

    let config = match args.next() {
        Some(dir) => {
            let store = MeterStore::new(PathBuf::from(dir))?;
            store
                .load_config(settings.frequency_hz)
                .context("Failed to load calibration store")?
        }
        None => demo_config(settings.frequency_hz)?,
    };
    info!(
        points = config.calibration.len(),
        devices = config.devices.devices().len(),
        frequency_hz = config.frequency_hz,
        "configuration loaded"
    );

    let sensor = SimulatedSensor::sweep(1000, 3000, 1).with_read_delay(Duration::from_micros(20));
    let mut meter = PowerMeter::new(Box::new(sensor), SharedConfig::new(config), &settings)?;
    let mut events = meter.subscribe();
    meter.start()?;

    let printer = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "display fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match event {
                MeterEvent::Reading(reading) => {
                    let scaled = reading
                        .scaled()
                        .map(|p| p.to_string())
                        .unwrap_or_default();
                    info!(
                        mode = ?reading.mode,
                        power_dbm = %format!("{:.2}", reading.power_dbm),
                        scaled = %scaled,
                        rate = %format!("{:.0}", reading.sample_rate_achieved),
                        warnings = reading.warnings.any(),
                        "reading"
                    );
                }
                MeterEvent::Diagnostics(d) => info!(
                    acquired = d.samples_acquired,
                    dropped = d.samples_dropped,
                    "diagnostics"
                ),
                MeterEvent::Fault(e) => warn!(error = %e, "hardware fault"),
                MeterEvent::CompensationFailed(e) => warn!(error = %e, "compensation failed"),
            }
        }
    });

    sleep(Duration::from_secs(2)).await;
    meter.set_mode(ReductionMode::PeakHold).await?;
    sleep(Duration::from_secs(1)).await;

    meter.stop();
    println!("\n{}", meter.report());
    meter.shutdown().await;
    printer.abort();

    Ok(())
}

fn demo_config(frequency_hz: f64) -> Result<MeterConfig> {
    let mut table = CalibrationTable::new();
    table.add_or_update(50e6, 0.0, -40.0, Some(1150), Some(2950))?;
    table.add_or_update(1e9, 0.0, -40.0, Some(1200), Some(3000))?;
    table.add_or_update(6e9, 0.0, -40.0, Some(1350), Some(3050))?;

    let pad = Device::new("pad-10", "10 dB attenuator")
        .with_samples(vec![
            LossSample::new(10e6, 10.0),
            LossSample::new(3e9, 10.3),
            LossSample::new(6e9, 10.8),
        ])
        .in_use(true);

    Ok(MeterConfig::new(frequency_hz)
        .with_calibration(table)
        .with_devices(DeviceChain::from_devices(vec![pad])))
}
