use rfmeter::calibration::{Compensation, Device, DeviceChain, LossSample, CalibrationTable};
use rfmeter::config::ReductionSettings;
use rfmeter::core::ReductionMode;
use rfmeter::engine::{HeldPeak, ReductionController};
use rfmeter::hal::RawSample;
use std::time::{Duration, Instant};

fn compensation(chain_loss_db: f64) -> Compensation {
    let mut table = CalibrationTable::new();
    table.add_or_update(100e6, 0.0, -20.0, Some(1000), Some(3000)).unwrap();
    table.add_or_update(1e9, 0.0, -20.0, Some(1000), Some(3000)).unwrap();
    let chain = DeviceChain::from_devices(vec![Device::new("pad", "pad")
        .with_samples(vec![
            LossSample::new(1e6, chain_loss_db),
            LossSample::new(2e9, chain_loss_db),
        ])
        .in_use(true)]);
    Compensation::resolve(&table, &chain, 100e6).unwrap()
}

fn controller(mode: ReductionMode, window_ms: u64) -> ReductionController {
    ReductionController::new(&ReductionSettings {
        mode,
        window_ms,
        ..ReductionSettings::default()
    })
    .unwrap()
}

#[test]
fn test_average_equals_mean_of_per_sample_dbm() {
    let compensation = compensation(6.0);
    let mut reducer = controller(ReductionMode::Average, 1000);
    let t0 = Instant::now();
    let codes = [1200u16, 1850, 2222, 2900, 1001];
    for code in codes {
        reducer.ingest(RawSample::at(code, t0));
    }

    let summary = reducer.roll(t0).unwrap();
    let reading = reducer.apply(&summary, &compensation);

    let expected = codes
        .iter()
        .map(|&c| compensation.rf_power_dbm(c as f64))
        .sum::<f64>()
        / codes.len() as f64;
    assert!((reading.power_dbm - expected).abs() < 1e-9);
    assert_eq!(reading.chain_loss_db, 6.0);
    assert!((reading.power_dbm - reading.sensor_power_dbm - 6.0).abs() < 1e-12);
}

#[test]
fn test_peak_hold_never_decreases() {
    let compensation = compensation(0.0);
    let mut reducer = controller(ReductionMode::PeakHold, 100);
    let t0 = Instant::now();

    // Lower code means more power for this negative slope
    let windows: [&[u16]; 5] = [
        &[2500, 2400],
        &[2000, 2600],
        &[2900],
        &[1500, 2800],
        &[2950, 2990],
    ];

    let mut previous = f64::NEG_INFINITY;
    let mut peaks = Vec::new();
    for (i, codes) in windows.iter().enumerate() {
        let at = t0 + Duration::from_millis(200 * i as u64);
        for &code in codes.iter() {
            reducer.ingest(RawSample::at(code, at));
        }
        // Each roll lands after the previous window expired
        let summary = reducer.roll(at).unwrap();
        let reading = reducer.apply(&summary, &compensation);
        assert!(reading.power_dbm >= previous);
        previous = reading.power_dbm;
        peaks.push(reading.power_dbm);
    }

    assert_eq!(peaks[0], -14.0);
    assert_eq!(peaks[1], -10.0);
    assert_eq!(peaks[2], -10.0);
    assert_eq!(peaks[3], -5.0);
    assert_eq!(peaks[4], -5.0);
}

#[test]
fn test_peak_resets_only_on_request() {
    let compensation = compensation(0.0);
    let mut reducer = controller(ReductionMode::PeakHold, 100);
    let t0 = Instant::now();

    reducer.ingest(RawSample::at(1000, t0));
    let summary = reducer.roll(t0).unwrap();
    assert_eq!(reducer.apply(&summary, &compensation).power_dbm, 0.0);

    // Mode switches and window changes keep the held value
    reducer.set_mode(ReductionMode::Average);
    reducer.set_mode(ReductionMode::PeakHold);
    reducer.set_window(Duration::from_millis(50)).unwrap();

    let t1 = t0 + Duration::from_secs(1);
    reducer.ingest(RawSample::at(3000, t1));
    let summary = reducer.roll(t1).unwrap();
    assert_eq!(reducer.apply(&summary, &compensation).power_dbm, 0.0);

    reducer.reset_peak();
    let t2 = t1 + Duration::from_secs(1);
    reducer.ingest(RawSample::at(3000, t2));
    let summary = reducer.roll(t2).unwrap();
    assert_eq!(reducer.apply(&summary, &compensation).power_dbm, -20.0);
}

#[test]
fn test_warnings_raised_without_clamping() {
    let mut reducer = controller(ReductionMode::Average, 1000);
    let t0 = Instant::now();
    // Code 0 is +10 dBm at the detector, +25 dBm after the chain
    reducer.ingest(RawSample::at(0, t0));
    let summary = reducer.roll(t0).unwrap();
    let reading = reducer.apply(&summary, &compensation(15.0));

    assert_eq!(reading.sensor_power_dbm, 10.0);
    assert_eq!(reading.power_dbm, 25.0);
    assert!(reading.warnings.above_zero_dbm);
    assert!(!reading.warnings.sensor_overload);

    let mut reducer = controller(ReductionMode::Average, 1000);
    reducer.ingest(RawSample::at(0, t0));
    reducer.ingest(RawSample::at(0, t0));
    let summary = reducer.roll(t0).unwrap();
    let mut overloaded = compensation(0.0);
    overloaded.intercept = 1300.0;
    let reading = reducer.apply(&summary, &overloaded);
    assert_eq!(reading.sensor_power_dbm, 13.0);
    assert!(reading.warnings.sensor_overload);
}

#[test]
fn test_rate_counts_drained_samples_per_second() {
    let mut reducer = controller(ReductionMode::Average, 250);
    let t0 = Instant::now();
    reducer.mark(t0);

    for i in 0..1000u64 {
        reducer.ingest(RawSample::at(2000, t0 + Duration::from_micros(i * 100)));
    }
    let first = reducer.roll(t0 + Duration::from_millis(100)).unwrap();
    assert!((first.rate - 10_000.0).abs() < 1e-6);

    for i in 0..50u64 {
        reducer.ingest(RawSample::at(2000, t0 + Duration::from_millis(100 + i)));
    }
    let second = reducer.roll(t0 + Duration::from_millis(200)).unwrap();
    assert_eq!(second.drained, 50);
    assert!((second.rate - 500.0).abs() < 1e-6);
    assert_eq!(reducer.achieved_rate(), second.rate);
}

#[test]
fn test_peak_keeps_the_power_it_was_measured_with() {
    let mut reducer = controller(ReductionMode::PeakHold, 100);
    let t0 = Instant::now();

    reducer.ingest(RawSample::at(2000, t0));
    let summary = reducer.roll(t0).unwrap();
    let first = reducer.apply(&summary, &compensation(0.0));
    assert_eq!(first.power_dbm, -10.0);
    assert_eq!(first.sensor_power_dbm, -10.0);

    // A pad goes in; the new window is weaker at the RF input
    let t1 = t0 + Duration::from_secs(1);
    reducer.ingest(RawSample::at(2900, t1));
    let summary = reducer.roll(t1).unwrap();
    let padded = compensation(5.0);
    let held = reducer.apply(&summary, &padded);

    assert_eq!(held.power_dbm, -10.0);
    assert_eq!(held.sensor_power_dbm, -10.0);
    assert_eq!(held.chain_loss_db, 0.0);
    assert!(!held.warnings.sensor_overload);
    assert_eq!(
        reducer.peak(),
        Some(HeldPeak {
            rf_dbm: -10.0,
            sensor_dbm: -10.0,
            chain_loss_db: 0.0,
        })
    );

    // Averages always use the chain in effect now
    reducer.set_mode(ReductionMode::Average);
    let average = reducer.apply(&summary, &padded);
    assert_eq!(average.sensor_power_dbm, -19.0);
    assert_eq!(average.power_dbm, -14.0);
    assert_eq!(average.chain_loss_db, 5.0);
}

#[test]
fn test_new_peak_carries_its_own_chain_loss() {
    let mut reducer = controller(ReductionMode::PeakHold, 100);
    let t0 = Instant::now();

    reducer.ingest(RawSample::at(2000, t0));
    let summary = reducer.roll(t0).unwrap();
    reducer.apply(&summary, &compensation(0.0));

    let t1 = t0 + Duration::from_secs(1);
    reducer.ingest(RawSample::at(2500, t1));
    let summary = reducer.roll(t1).unwrap();
    let reading = reducer.apply(&summary, &compensation(30.0));

    assert_eq!(reading.power_dbm, 15.0);
    assert_eq!(reading.sensor_power_dbm, -15.0);
    assert_eq!(reading.chain_loss_db, 30.0);
}

#[test]
fn test_discard_before_drops_older_samples() {
    let mut reducer = controller(ReductionMode::Average, 1000);
    let t0 = Instant::now();
    reducer.ingest(RawSample::at(1000, t0));
    reducer.ingest(RawSample::at(3000, t0 + Duration::from_millis(5)));

    reducer.discard_before(t0 + Duration::from_millis(5));
    let summary = reducer.roll(t0 + Duration::from_millis(10)).unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.mean_code, 3000.0);
}
