//! Integration tests for the command line interface.
//!
//! These tests run the binary and verify configuration validation, including
//! the TLS settings of the control API, and config file generation.

use std::io::Write;
use tempfile::NamedTempFile;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_herakles-limit-notifier"))
}

fn run(args: &[&str]) -> (bool, String) {
    let output = std::process::Command::new(binary_path())
        .args(args)
        .output()
        .expect("Failed to execute command");

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.success(), combined)
}

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_default_config_is_valid() {
    let (ok, output) = run(&["--no-config", "--check-config"]);
    assert!(ok, "unexpected failure: {}", output);
    assert!(output.contains("Configuration is valid"));
}

#[test]
fn test_tls_enabled_without_paths() {
    let (ok, output) = run(&["--no-config", "--enable-tls", "--check-config"]);
    assert!(!ok);
    assert!(
        output.contains("TLS is enabled but neither tls_cert_path nor tls_key_path are set"),
        "Expected error about missing TLS paths, got: '{}'",
        output
    );
}

#[test]
fn test_tls_enabled_with_cert_only() {
    let (ok, output) = run(&[
        "--no-config",
        "--enable-tls",
        "--tls-cert",
        "/some/path.pem",
        "--check-config",
    ]);
    assert!(!ok);
    assert!(
        output.contains("TLS is enabled but tls_key_path is not set"),
        "Expected error about missing key path, got: '{}'",
        output
    );
}

#[test]
fn test_tls_with_missing_files() {
    let (ok, output) = run(&[
        "--no-config",
        "--enable-tls",
        "--tls-cert",
        "/nonexistent/cert.pem",
        "--tls-key",
        "/nonexistent/key.pem",
        "--check-config",
    ]);
    assert!(!ok);
    assert!(
        output.contains("TLS certificate file not found"),
        "Expected error about missing certificate, got: '{}'",
        output
    );
}

#[test]
fn test_zero_interval_rejected() {
    let (ok, output) = run(&["--no-config", "--interval", "0", "--check-config"]);
    assert!(!ok);
    assert!(output.contains("interval_seconds must be greater than 0"));
}

#[test]
fn test_invalid_limit_threshold_in_file() {
    let file = config_file(
        ".yaml",
        "limits:\n  memory:\n    threshold: 150\n",
    );
    let path = file.path().to_string_lossy().to_string();

    let (ok, output) = run(&["--config", &path, "--check-config"]);
    assert!(!ok);
    assert!(
        output.contains("limits.memory.threshold must be between 0 and 100"),
        "got: '{}'",
        output
    );
}

#[test]
fn test_valid_toml_config() {
    let file = config_file(
        ".toml",
        "interval_seconds = 60\nwebhook_url = \"https://chat.example.com/hook\"\n\n[limits.cpu_load]\nthreshold = 90.0\n",
    );
    let path = file.path().to_string_lossy().to_string();

    let (ok, output) = run(&["--config", &path, "--check-config"]);
    assert!(ok, "unexpected failure: {}", output);
}

#[test]
fn test_missing_explicit_config_fails() {
    let (ok, output) = run(&["--config", "/nonexistent/notifier.yaml", "--check-config"]);
    assert!(!ok);
    assert!(output.contains("Config file not found"));
}

#[test]
fn test_show_config_applies_cli_overrides() {
    let (ok, output) = run(&[
        "--no-config",
        "--interval",
        "42",
        "--show-config",
        "--config-format",
        "json",
    ]);
    assert!(ok, "unexpected failure: {}", output);
    let value: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
    assert_eq!(value["interval_seconds"], 42);
}

#[test]
fn test_config_command_writes_stdout() {
    let (ok, output) = run(&["config", "-o", "-", "--commented"]);
    assert!(ok, "unexpected failure: {}", output);
    assert!(output.starts_with("# Herakles Limit Notifier Configuration"));
    assert!(output.contains("interval_seconds"));
}
