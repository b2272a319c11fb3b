//! Integration tests for configuration loading as used by `watchpost config`.
//!
//! Exercises real TOML files and `WATCHPOST_*` environment overrides.

use std::fs;

use serial_test::serial;
use tempfile::TempDir;
use watchpost_core::WatchpostConfig;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("watchpost.toml");

    let valid_config = r#"
[general]
log_level = "debug"
log_format = "json"

[scheduler]
workers = 2
heavy_concurrency = 1
"#;

    fs::write(&config_path, valid_config).expect("should write config");

    // When: Loading the config
    let config = WatchpostConfig::load(&config_path)
        .await
        .expect("valid config should load");

    // Then: File values apply and omitted keys keep their defaults
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.scheduler.workers, 2);
    assert_eq!(config.scheduler.queue_capacity, 256);
    assert_eq!(config.reports.history_limit, 100);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    // Given: A malformed TOML file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");

    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write bad config");

    // When: Loading the config
    let result = WatchpostConfig::load(&config_path).await;

    // Then: Should fail as invalid configuration
    let err = result.expect_err("malformed TOML should fail to load");
    assert_eq!(err.reason(), "invalid-configuration");
}

#[tokio::test]
async fn test_config_validate_missing_file() {
    // Given: A nonexistent file path
    let config_path = std::path::PathBuf::from("/nonexistent/watchpost.toml");

    // When: Loading the config
    let result = WatchpostConfig::load(&config_path).await;

    // Then: Should fail
    assert!(result.is_err(), "missing file should fail to load");
}

#[tokio::test]
async fn test_config_validate_rejects_zero_workers() {
    // Given: A config with no workers
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("watchpost.toml");
    fs::write(&config_path, "[scheduler]\nworkers = 0\n").expect("should write config");

    // When: Loading the config
    let err = WatchpostConfig::load(&config_path)
        .await
        .expect_err("zero workers should be rejected");

    // Then: The offending field is named
    assert!(err.to_string().contains("scheduler.workers"));
}

#[tokio::test]
async fn test_config_validate_empty_file_uses_defaults() {
    // Given: An empty config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("empty.toml");
    fs::write(&config_path, "").expect("should write empty file");

    // When: Loading the config
    let config = WatchpostConfig::load(&config_path)
        .await
        .expect("empty file should load");

    // Then: Defaults apply
    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.scheduler.workers, 4);
    assert!(config.plans.path.is_empty());
}

#[tokio::test]
#[serial]
async fn test_config_env_override_wins_over_file() {
    // Given: A file setting workers and an env override
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("watchpost.toml");
    fs::write(&config_path, "[scheduler]\nworkers = 2\n").expect("should write config");
    unsafe {
        std::env::set_var("WATCHPOST_SCHEDULER_WORKERS", "8");
        std::env::set_var("WATCHPOST_PLUGINS_OPTIONAL", "csp, robots");
    }

    // When: Loading the config
    let result = WatchpostConfig::load(&config_path).await;
    unsafe {
        std::env::remove_var("WATCHPOST_SCHEDULER_WORKERS");
        std::env::remove_var("WATCHPOST_PLUGINS_OPTIONAL");
    }

    // Then: The environment value is used
    let config = result.expect("config should load");
    assert_eq!(config.scheduler.workers, 8);
    assert_eq!(config.plugins.optional, vec!["csp", "robots"]);
}

#[tokio::test]
#[serial]
async fn test_config_invalid_env_override_is_ignored() {
    // Given: A non-numeric override
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("watchpost.toml");
    fs::write(&config_path, "[scheduler]\nworkers = 3\n").expect("should write config");
    unsafe {
        std::env::set_var("WATCHPOST_SCHEDULER_WORKERS", "many");
    }

    // When: Loading the config
    let result = WatchpostConfig::load(&config_path).await;
    unsafe {
        std::env::remove_var("WATCHPOST_SCHEDULER_WORKERS");
    }

    // Then: The file value stays
    assert_eq!(result.expect("config should load").scheduler.workers, 3);
}
