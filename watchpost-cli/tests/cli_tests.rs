//! End-to-end tests for the `watchpost` binary.
//!
//! Each test runs in an empty temp dir so no stray `watchpost.toml` is
//! picked up.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn watchpost(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_watchpost"))
        .args(args)
        .current_dir(dir.path())
        .env("RUST_LOG", "off")
        .output()
        .expect("should run watchpost binary")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_plans_list_json() {
    // Given: No config file
    let dir = TempDir::new().expect("should create temp dir");

    // When: Listing plans as JSON
    let output = watchpost(&dir, &["plans", "list", "--output", "json"]);

    // Then: The built-in plans are listed
    assert!(output.status.success());
    let json = stdout_json(&output);
    let names: Vec<&str> = json["plans"]
        .as_array()
        .expect("plans array")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["basic", "headers"]);
}

#[test]
fn test_plans_show_unknown_plan_fails() {
    // Given: No config file
    let dir = TempDir::new().expect("should create temp dir");

    // When: Showing a plan that does not exist
    let output = watchpost(&dir, &["plans", "show", "nope"]);

    // Then: Exit code 1 with the plan named on stderr
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope"));
}

#[test]
fn test_plugins_list_json() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = watchpost(&dir, &["plugins", "list", "--output", "json"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    let ids: Vec<&str> = json["plugins"]
        .as_array()
        .expect("plugins array")
        .iter()
        .filter_map(|p| p["identifier"].as_str())
        .collect();
    assert!(ids.contains(&"alive"));
    assert!(ids.contains(&"robots"));
}

#[test]
fn test_config_validate_reports_invalid_file() {
    // Given: A config file with zero workers
    let dir = TempDir::new().expect("should create temp dir");
    fs::write(dir.path().join("watchpost.toml"), "[scheduler]\nworkers = 0\n")
        .expect("should write config");

    // When: Validating it
    let output = watchpost(&dir, &["config", "validate", "--output", "json"]);

    // Then: Exit code 2 and the report marks it invalid
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["valid"], false);
    assert_eq!(json["source"], "watchpost.toml");
}

#[test]
fn test_config_show_section() {
    let dir = TempDir::new().expect("should create temp dir");
    let config_path = dir.path().join("custom.toml");
    fs::write(&config_path, "[scheduler]\nworkers = 7\n").expect("should write config");
    let config_arg = config_path.display().to_string();

    let output = watchpost(
        &dir,
        &[
            "config",
            "show",
            "--section",
            "scheduler",
            "--config",
            &config_arg,
            "--output",
            "json",
        ],
    );

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["section"], "scheduler");
    assert!(json["config"].as_str().expect("toml body").contains("workers = 7"));
}

#[test]
fn test_scan_unreachable_target_exits_5() {
    // Given: A target nothing listens on
    let dir = TempDir::new().expect("should create temp dir");

    // When: Running the headers plan
    let output = watchpost(
        &dir,
        &[
            "scan",
            "http://127.0.0.1:1",
            "--plan",
            "headers",
            "--tag",
            "ci",
            "--output",
            "json",
        ],
    );

    // Then: The scan FAILED on the alive check and the rest was cancelled
    assert_eq!(output.status.code(), Some(5));
    let json = stdout_json(&output);
    assert_eq!(json["summary"]["state"], "FAILED");
    assert_eq!(json["summary"]["issues"]["fatal"], 1);
    assert_eq!(json["sessions"][0]["issues"][0]["code"], "ALIVE-1");
    assert_eq!(json["sessions"][1]["state"], "CANCELLED");
}

#[test]
fn test_scan_unknown_plan_exits_1() {
    let dir = TempDir::new().expect("should create temp dir");

    let output = watchpost(&dir, &["scan", "http://127.0.0.1:1", "--plan", "nope"]);

    assert_eq!(output.status.code(), Some(1));
}
