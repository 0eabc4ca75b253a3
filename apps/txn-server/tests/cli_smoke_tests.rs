#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the `txn-server` binary: help/version output and
//! configuration-loading failure modes, without actually binding a port.

use std::process::{Command, Stdio};

fn run_txn_server(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_txn-server"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to execute txn-server")
}

#[test]
fn help_lists_expected_flags() {
    let output = run_txn_server(&["--help"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--bind"));
    assert!(stdout.contains("--verbose"));
}

#[test]
fn version_reports_a_version() {
    let output = run_txn_server(&["--version"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("txn-server"));
}

#[test]
fn unreadable_config_file_fails_with_a_clear_error() {
    let output = run_txn_server(&["--config", "/nonexistent/txn-server.yaml"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config") || stderr.contains("configuration"));
}

#[test]
fn malformed_yaml_fails_with_a_clear_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "max_concurrent: [unclosed").expect("write bad yaml");

    let output = run_txn_server(&["--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
}
