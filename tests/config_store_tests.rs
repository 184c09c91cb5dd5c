use rfmeter::calibration::{CalibrationTable, Device, DeviceChain, LossSample};
use rfmeter::config::{MeterConfig, MeterSettings, MeterStore, SharedConfig};
use rfmeter::core::ReductionMode;
use tempfile::tempdir;

fn sample_config() -> MeterConfig {
    let mut table = CalibrationTable::new();
    table.add_or_update(100e6, 0.0, -20.0, Some(1000), Some(3000)).unwrap();
    table.add_or_update(2.4e9, 0.0, -20.0, Some(1150), Some(3100)).unwrap();

    let devices = DeviceChain::from_devices(vec![
        Device::new("att-20", "20 dB attenuator")
            .with_samples(vec![LossSample::new(10e6, 20.1), LossSample::new(3e9, 20.6)])
            .in_use(true),
        Device::new("cable", "1 m SMA"),
    ]);

    MeterConfig::new(433.92e6)
        .with_calibration(table)
        .with_devices(devices)
}

#[test]
fn test_store_round_trip() {
    let dir = tempdir().unwrap();
    let store = MeterStore::new(dir.path().to_path_buf()).unwrap();

    let config = sample_config();
    store.save_config(&config).unwrap();

    let loaded = store.load_config(433.92e6).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_save_config_removes_deleted_devices() {
    let dir = tempdir().unwrap();
    let store = MeterStore::new(dir.path().to_path_buf()).unwrap();

    let mut config = sample_config();
    store.save_config(&config).unwrap();

    config.devices.remove("cable").unwrap();
    store.save_config(&config).unwrap();

    let ids: Vec<String> = store.list_devices().unwrap().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["att-20".to_string()]);
    assert!(!dir.path().join("devices").join("cable.json").exists());
}

#[test]
fn test_corrupt_device_file_skipped() {
    let dir = tempdir().unwrap();
    let store = MeterStore::new(dir.path().to_path_buf()).unwrap();
    store.save_config(&sample_config()).unwrap();

    std::fs::write(dir.path().join("devices").join("broken.json"), "{ not json").unwrap();
    assert_eq!(store.list_devices().unwrap().len(), 2);
}

#[test]
fn test_loaded_store_feeds_shared_config() {
    let dir = tempdir().unwrap();
    let store = MeterStore::new(dir.path().to_path_buf()).unwrap();
    store.save_config(&sample_config()).unwrap();

    let shared = SharedConfig::new(store.load_config(433.92e6).unwrap());
    shared.set_device_in_use("cable", true).unwrap();

    store.save_config(&shared.snapshot().config).unwrap();
    assert!(store.load_device("cable").unwrap().in_use);
}

#[tokio::test]
async fn test_settings_save_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut settings = MeterSettings::default();
    settings.frequency_hz = 2.4e9;
    settings.reduction.mode = ReductionMode::PeakHold;
    settings.acquisition.bus_clock_hz = 976_000;
    settings.save(&path).await.unwrap();

    let loaded = MeterSettings::load_or_create(&path).await.unwrap();
    assert_eq!(loaded, settings);
}
