//! CLI tests for corral
//!
//! This test suite covers:
//! - Argument parsing and help output
//! - The config subcommand with files, environment and `-p` overrides
//! - The probe subcommand against a local listener and unreachable servers
//! - Structured (JSON) output

use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpListener;
use tempfile::tempdir;

// Helper to get a command with no ambient pool configuration
fn corral_cmd() -> Command {
    let mut cmd = Command::cargo_bin("corral").unwrap();
    cmd.env_remove("CORRAL_CONFIG").env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("CORRAL_POOL_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

// Helper to find a port nothing listens on
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ============================================================================
// Help and argument errors
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    corral_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version() {
    corral_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("corral"));
}

#[test]
fn test_probe_requires_endpoint() {
    corral_cmd().arg("probe").assert().failure();
}

#[test]
fn test_malformed_override_is_rejected() {
    corral_cmd()
        .args(["-p", "maxActive", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key=value"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_defaults_as_properties() {
    corral_cmd()
        .args(["config", "--format", "properties"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exhaustedAction=WAIT"))
        .stdout(predicate::str::contains("lifo=true"))
        .stdout(predicate::str::contains("testOnIdle=true"));
}

#[test]
fn test_config_override_as_json() {
    let output = corral_cmd()
        .args(["-p", "maxActive=4", "config", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["maxActive"], 4);
    assert_eq!(parsed["exhaustedAction"], "WAIT");
}

#[test]
fn test_config_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.toml");
    std::fs::write(&path, "maxTotal = 12\nexhaustedAction = \"FAIL\"\n").unwrap();

    corral_cmd()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("maxTotal = 12"))
        .stdout(predicate::str::contains("exhaustedAction = \"FAIL\""));
}

#[test]
fn test_config_env_override() {
    corral_cmd()
        .env("CORRAL_POOL_LIFO", "false")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("lifo = false"));
}

#[test]
fn test_config_missing_file_fails() {
    let dir = tempdir().unwrap();
    corral_cmd()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

// ============================================================================
// probe
// ============================================================================

#[test]
fn test_probe_reuses_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    corral_cmd()
        .args(["--no-color", "probe", &addr, "--rounds", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("round 1"))
        .stdout(predicate::str::contains("(new)"))
        .stdout(predicate::str::contains("(reused)"));
    drop(listener);
}

#[test]
fn test_probe_unreachable_server_fails() {
    let addr = format!("127.0.0.1:{}", closed_port());
    corral_cmd()
        .args(["--no-color", "probe", &addr])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("failed"));
}

#[test]
fn test_probe_invalid_address_fails() {
    corral_cmd()
        .args(["--no-color", "probe", "not-an-address"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Invalid endpoint address"));
}

#[test]
fn test_probe_json_output() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());

    let output = corral_cmd()
        .args(["--output", "json", "probe", &addr, "-n", "3"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = parsed["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r["ok"] == true));
    assert_eq!(parsed["stats"]["created"], 1);
    assert_eq!(parsed["stats"]["hits"], 2);
    drop(listener);
}
