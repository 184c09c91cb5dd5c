use rfmeter::calibration::{CalibrationTable, Device, LossSample};
use rfmeter::config::{MeterConfig, MeterSettings, SharedConfig};
use rfmeter::core::{CalibratedReading, MeterEvent, ReductionMode};
use rfmeter::engine::PowerMeter;
use rfmeter::error::{HardwareError, MeterError};
use rfmeter::hal::mock::SimulatedSensor;
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};
use tokio::time::{timeout, Duration};

fn calibrated_config() -> MeterConfig {
    let mut table = CalibrationTable::new();
    table.add_or_update(100e6, 0.0, -20.0, Some(1000), Some(3000)).unwrap();
    table.add_or_update(1e9, 0.0, -20.0, Some(1000), Some(3000)).unwrap();
    MeterConfig::new(100e6).with_calibration(table)
}

fn fast_settings() -> MeterSettings {
    let mut settings = MeterSettings::default();
    settings.reduction.window_ms = 50;
    settings.reduction.tick_interval_ms = 10;
    settings
}

async fn next_reading(events: &mut broadcast::Receiver<MeterEvent>) -> CalibratedReading {
    loop {
        match timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(MeterEvent::Reading(reading))) => return reading,
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(e)) => panic!("event stream closed: {}", e),
            Err(_) => panic!("no reading within 5s"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_constant_input_reads_expected_power() {
    let config = SharedConfig::new(calibrated_config());
    let mut meter =
        PowerMeter::new(Box::new(SimulatedSensor::constant(2000)), config, &fast_settings())
            .unwrap();
    let mut events = meter.subscribe();
    meter.start().unwrap();

    let reading = next_reading(&mut events).await;
    assert_eq!(reading.power_dbm, -10.0);
    assert_eq!(reading.mode, ReductionMode::Average);
    assert!(reading.samples > 0);
    assert!(!reading.warnings.any());

    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_configuration_edits_apply_to_next_reading() {
    let config = SharedConfig::new(calibrated_config());
    let mut meter = PowerMeter::new(
        Box::new(SimulatedSensor::constant(2000)),
        config.clone(),
        &fast_settings(),
    )
    .unwrap();
    let mut events = meter.subscribe();
    meter.start().unwrap();
    next_reading(&mut events).await;

    config
        .upsert_device(
            Device::new("pad", "30 dB")
                .with_samples(vec![LossSample::new(1e6, 30.0), LossSample::new(2e9, 30.0)])
                .in_use(true),
        )
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let reading = next_reading(&mut events).await;
        if reading.chain_loss_db == 30.0 {
            assert_eq!(reading.power_dbm, 20.0);
            assert!(reading.warnings.above_zero_dbm);
            break;
        }
        assert!(tokio::time::Instant::now() < deadline);
    }

    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_calibration_surfaces_as_error() {
    let config = SharedConfig::new(MeterConfig::new(100e6));
    let mut meter =
        PowerMeter::new(Box::new(SimulatedSensor::constant(2000)), config, &fast_settings())
            .unwrap();
    let mut events = meter.subscribe();
    meter.start().unwrap();

    let error = loop {
        match timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(MeterEvent::CompensationFailed(e))) => break e,
            Ok(Ok(MeterEvent::Reading(r))) => panic!("uncalibrated meter produced {:?}", r),
            Ok(_) => continue,
            Err(_) => panic!("no compensation failure reported"),
        }
    };
    assert_eq!(error, MeterError::InsufficientCalibration { available: 0 });

    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fault_published_and_held() {
    let config = SharedConfig::new(calibrated_config());
    let sensor = SimulatedSensor::constant(2000)
        .with_fault_after(500, HardwareError::Transport("spi timeout".to_string()));
    let mut meter = PowerMeter::new(Box::new(sensor), config, &fast_settings()).unwrap();
    let mut events = meter.subscribe();
    meter.start().unwrap();

    let fault = loop {
        match timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(MeterEvent::Fault(e))) => break e,
            Ok(_) => continue,
            Err(_) => panic!("no fault reported"),
        }
    };
    assert_eq!(fault, HardwareError::Transport("spi timeout".to_string()));
    assert_eq!(meter.state().name(), "Faulted");
    assert_err!(meter.start());

    assert_ok!(meter.acknowledge_fault());
    assert_eq!(meter.state().name(), "Idle");

    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peak_hold_through_facade() {
    let config = SharedConfig::new(calibrated_config());
    // 1500 is the strongest code in the sweep: -5 dBm
    let sensor = SimulatedSensor::sequence(vec![2500, 1500, 2900, 2000]);
    let mut meter = PowerMeter::new(Box::new(sensor), config, &fast_settings()).unwrap();
    let mut events = meter.subscribe();

    meter.set_mode(ReductionMode::PeakHold).await.unwrap();
    meter.start().unwrap();

    let mut previous = f64::NEG_INFINITY;
    for _ in 0..5 {
        let reading = next_reading(&mut events).await;
        if reading.mode == ReductionMode::PeakHold {
            assert!(reading.power_dbm >= previous);
            previous = reading.power_dbm;
        }
    }
    assert_eq!(previous, -5.0);

    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_window_rejected() {
    let config = SharedConfig::new(calibrated_config());
    let meter =
        PowerMeter::new(Box::new(SimulatedSensor::constant(2000)), config, &fast_settings())
            .unwrap();
    assert!(matches!(
        meter.set_window(Duration::from_secs(60)).await,
        Err(MeterError::Configuration(_))
    ));
    assert_ok!(meter.set_window(Duration::from_millis(500)).await);
    meter.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_settings_frequency_applied() {
    let config = SharedConfig::new(calibrated_config());
    let mut settings = fast_settings();
    settings.frequency_hz = 1e9;

    let mut meter =
        PowerMeter::new(Box::new(SimulatedSensor::constant(2000)), config.clone(), &settings)
            .unwrap();
    assert_eq!(config.snapshot().config.frequency_hz, 1e9);

    let mut events = meter.subscribe();
    meter.start().unwrap();
    let reading = next_reading(&mut events).await;
    assert_eq!(reading.frequency_hz, 1e9);
    assert_eq!(reading.power_dbm, -10.0);

    meter.shutdown().await;
}
