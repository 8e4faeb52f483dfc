//! Config file loading

use notification_relay::{RelayConfig, RestartPolicy};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "workers": 4,
            "package_name": "com.acme.relay",
            "restart": {"mode": "backoff", "initial_ms": 500, "max_ms": 60000}
        }"#,
    )
    .unwrap();

    let config = RelayConfig::load(Some(&path)).unwrap();
    assert_eq!(config.workers, 4);
    assert_eq!(config.package_name, "com.acme.relay");
    assert_eq!(
        config.restart,
        RestartPolicy::Backoff { initial_ms: 500, max_ms: 60000 }
    );
    // Untouched fields keep their defaults
    assert_eq!(config.max_cache_entries, 1000);
    assert_eq!(config.indicator.id, 1001);
}

#[test]
fn test_missing_explicit_file_is_error() {
    let dir = TempDir::new().unwrap();
    let err = RelayConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read config file"));
}

#[test]
fn test_malformed_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json").unwrap();

    let err = RelayConfig::load_from(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config file"));
}

#[test]
fn test_invalid_values_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"max_cache_entries": 0}"#).unwrap();

    assert!(RelayConfig::load_from(&path).is_err());
}

#[test]
fn test_effective_config_round_trips() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let config = RelayConfig::default();
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    assert_eq!(RelayConfig::load_from(&path).unwrap(), config);
}
