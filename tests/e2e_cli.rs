//! CLI end-to-end tests
//!
//! Tests for the auraflix command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the auraflix binary
#[allow(deprecated)]
fn auraflix_cmd() -> Command {
    Command::cargo_bin("auraflix").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = auraflix_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = auraflix_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("auraflix"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("auraflix.toml");
    fs::write(
        &config_path,
        r#"
[server]
port = 9000

[media]
root = "/srv/auraflix"
chunk_size_bytes = 65536
"#,
    )
    .unwrap();

    let mut cmd = auraflix_cmd();
    cmd.env_remove("APP_PORT")
        .env_remove("MEDIA_DIR")
        .arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("9000"))
        .stdout(predicate::str::contains("65536"));
}

#[test]
fn test_cli_validate_rejects_zero_chunk_size() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("auraflix.toml");
    fs::write(&config_path, "[media]\nchunk_size_bytes = 0\n").unwrap();

    let mut cmd = auraflix_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("chunk size"));
}

#[test]
fn test_cli_validate_missing_file() {
    let mut cmd = auraflix_cmd();
    cmd.arg("validate")
        .arg("/nonexistent/auraflix.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_cli_env_overrides_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("auraflix.toml");
    fs::write(&config_path, "[server]\nport = 9000\n").unwrap();

    let mut cmd = auraflix_cmd();
    cmd.env("APP_PORT", "9123")
        .arg("--config")
        .arg(&config_path)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("9123"));
}

#[test]
fn test_cli_validate_accepts_global_config_after_subcommand() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("auraflix.toml");
    fs::write(&config_path, "[server]\nport = 9001\n").unwrap();

    let mut cmd = auraflix_cmd();
    cmd.env_remove("APP_PORT")
        .arg("validate")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("9001"));
}
