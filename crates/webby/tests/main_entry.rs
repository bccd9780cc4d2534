//! Integration tests for the `webby` binary entry point.
//!
//! Covers the invocation-only modes, operator-facing failures when no daemon
//! is running, and a full start/status/stop cycle through a detached daemon.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use serde_json::json;
use tempfile::TempDir;

fn webby(dir: &Path) -> Command {
    let mut command = cargo_bin_cmd!("webby");
    command
        .env_remove("WEBBY_CONFIG")
        .env_remove("WEBBY_SOCKET")
        .env_remove("WEBBY_BIN")
        .arg("--socket")
        .arg(dir.join("webby.sock"));
    command
}

fn write_config(dir: &Path) -> PathBuf {
    let site = dir.join("site");
    fs::create_dir_all(&site).expect("create site");
    fs::write(site.join("index.html"), "home").expect("write index");
    let port = TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .expect("free port")
        .port();
    let config = dir.join("config.json");
    let document = json!({
        "Site": site,
        "Port": port,
        "Log": dir.join("webby.log"),
        "AutoReload": false,
    });
    fs::write(&config, document.to_string()).expect("write config");
    config
}

#[test]
fn gen_config_writes_the_defaults() {
    let dir = TempDir::new().expect("temp dir");
    let config = dir.path().join("etc").join("config.json");

    webby(dir.path())
        .arg("--gen-config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("Done!"));

    let written = fs::read_to_string(&config).expect("read config");
    assert!(written.contains("\"AutoReload\": true"));
    assert!(written.contains("\"LogLevelPrint\": \"all\""));
}

#[test]
fn control_commands_fail_without_a_daemon() {
    let dir = TempDir::new().expect("temp dir");

    webby(dir.path())
        .arg("--status")
        .assert()
        .failure()
        .stderr(contains("Could not open Unix Domain Socket"))
        .stderr(contains("likely means webby is not running"));
}

#[test]
fn bare_invocation_explains_itself() {
    let dir = TempDir::new().expect("temp dir");

    webby(dir.path())
        .assert()
        .failure()
        .stderr(contains("nothing to do"));
}

#[test]
fn show_log_prints_the_configured_log() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(dir.path());
    fs::write(dir.path().join("webby.log"), "daemon started\n").expect("write log");

    webby(dir.path())
        .arg("--show-log")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("daemon started"));
}

#[test]
fn started_daemon_answers_status_and_stops() {
    let dir = TempDir::new().expect("temp dir");
    let config = write_config(dir.path());

    webby(dir.path())
        .arg("--start")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("Started webby!"));

    let status = webby(dir.path()).arg("--status").assert();
    let stop = webby(dir.path()).arg("--stop").assert();

    status.success().stdout(contains("status: OK"));
    stop.success().stdout(contains("Stopped!"));
}
