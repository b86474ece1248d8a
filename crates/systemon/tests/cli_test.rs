//! Integration tests for the `systemon` CLI binary.
//!
//! Argument parsing, help output, shell completions and error handling run
//! without a gateway; the fleet commands run against a wiremock gateway.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `systemon` binary with env isolation.
///
/// Clears all `SYSTEMON_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn systemon_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("systemon");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env("NO_COLOR", "1");
    for (key, _) in std::env::vars() {
        if key.starts_with("SYSTEMON_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

fn isolated() -> (tempfile::TempDir, assert_cmd::Command) {
    let home = tempfile::tempdir().unwrap();
    let cmd = systemon_cmd(home.path());
    (home, cmd)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write a default profile pointing at `server` over plain HTTP.
fn write_profile(home: &Path, server: &MockServer) {
    let addr = server.address();
    let dir = home.join("systemon");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        format!(
            "default_profile = \"lab\"\n\n\
             [profiles.lab]\n\
             host = \"{}\"\n\
             port = {}\n\
             protocol = \"http\"\n",
            addr.ip(),
            addr.port()
        ),
    )
    .unwrap();
}

async fn mock_fleet(server: &MockServer) {
    let mic = json!({
        "hardwareId": "A1",
        "model": "MXA310",
        "deviceName": "Ceiling Mic",
        "deviceState": "ONLINE",
        "audioMute": "false"
    });
    Mock::given(method("GET"))
        .and(path("/api/v1.0/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([mic])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1.0/devices/A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mic))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let (_home, mut cmd) = isolated();
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let (_home, mut cmd) = isolated();
    cmd.arg("--help").assert().success().stdout(
        predicate::str::contains("SystemOn")
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("control"))
            .and(predicate::str::contains("diagnostics")),
    );
}

#[test]
fn test_version_flag() {
    let (_home, mut cmd) = isolated();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("systemon"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let (_home, mut cmd) = isolated();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let (_home, mut cmd) = isolated();
    cmd.args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let (_home, mut cmd) = isolated();
    let output = cmd.arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_without_config() {
    let (_home, mut cmd) = isolated();
    cmd.args(["devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn test_unknown_profile_is_reported() {
    let (_home, mut cmd) = isolated();
    cmd.args(["--profile", "nowhere", "devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_unknown_control_is_a_usage_error() {
    let (_home, mut cmd) = isolated();
    cmd.args(["--host", "127.0.0.1", "--port", "1", "control", "A1", "Volume", "3"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Known controls"));
}

#[test]
fn test_reboot_requires_confirmation_when_non_interactive() {
    let (_home, mut cmd) = isolated();
    cmd.args(["--host", "127.0.0.1", "--port", "1", "control", "A1", "Reboot"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_unreachable_gateway_exits_with_connection_code() {
    let (_home, mut cmd) = isolated();
    cmd.args([
        "--host", "127.0.0.1", "--port", "1", "--timeout", "2", "devices", "list",
    ])
    .assert()
    .code(7);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_points_into_config_home() {
    let (home, mut cmd) = isolated();
    cmd.args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(home.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_set_then_show_masks_api_key() {
    let home = tempfile::tempdir().unwrap();
    systemon_cmd(home.path())
        .args(["config", "set", "host", "10.0.0.5"])
        .assert()
        .success();
    systemon_cmd(home.path())
        .args(["config", "set", "api-key", "s3cret"])
        .assert()
        .success();

    systemon_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("host = \"10.0.0.5\"")
                .and(predicate::str::contains("****"))
                .and(predicate::str::contains("s3cret").not()),
        );
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let (_home, mut cmd) = isolated();
    cmd.args(["config", "set", "colour", "blue"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

// ── Against a mock gateway ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_list_json() {
    let server = MockServer::start().await;
    mock_fleet(&server).await;
    let home = tempfile::tempdir().unwrap();
    write_profile(home.path(), &server);

    let output = systemon_cmd(home.path())
        .args(["devices", "list", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["id"], "A1");
    assert_eq!(devices[0]["model"], "MXA310");
    assert_eq!(devices[0]["online"], true);
    assert_eq!(devices[0]["properties"]["DeviceMake"], "Shure");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_get_missing_device() {
    let server = MockServer::start().await;
    mock_fleet(&server).await;
    let home = tempfile::tempdir().unwrap();
    write_profile(home.path(), &server);

    systemon_cmd(home.path())
        .args(["devices", "get", "ZZ"])
        .assert()
        .code(4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_control_mute_sends_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1.0/devices/A1/audio/mute"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();
    write_profile(home.path(), &server);

    systemon_cmd(home.path())
        .args(["control", "A1", "Mute", "on"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Mute = on"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_diagnostics_report_listing_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1.0/devices"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "down" })))
        .mount(&server)
        .await;
    let home = tempfile::tempdir().unwrap();
    write_profile(home.path(), &server);

    systemon_cmd(home.path())
        .args(["diagnostics", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GatewayException"));
}
