//! Binary-level tests against an isolated `CLOUDSAVE_HOME`.
//!
//! stdout is a pipe here, so every command runs in JSON mode.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const ENV_OVERRIDES: &[&str] = &[
    "CLOUDSAVE_CONFIG",
    "CLOUDSAVE_API_URL",
    "CLOUDSAVE_GAME_ID",
    "CLOUDSAVE_SAVE_DIR",
    "CLOUDSAVE_BACKEND",
    "CLOUDSAVE_USER_ID",
    "CLOUDSAVE_SYNC_INTERVAL",
    "CLOUDSAVE_PASSWORD",
    "RUST_LOG",
];

fn cloudsave(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cloudsave").unwrap();
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd.env("CLOUDSAVE_HOME", home);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let text = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(text.trim()).unwrap_or_else(|e| panic!("bad JSON {text:?}: {e}"))
}

fn stderr_json(output: &std::process::Output) -> Value {
    let text = String::from_utf8_lossy(&output.stderr);
    let line = text.lines().last().unwrap_or_default();
    serde_json::from_str(line).unwrap_or_else(|e| panic!("bad JSON {text:?}: {e}"))
}

fn init_local(home: &Path) {
    cloudsave(home)
        .args(["init", "--backend", "local", "--game-id", "vn", "--user-id", "player"])
        .assert()
        .success();
}

#[test]
fn test_version_json() {
    let home = TempDir::new().unwrap();
    let output = cloudsave(home.path()).arg("version").output().unwrap();

    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["name"], "cloudsave");
    assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_sync_before_init_is_not_configured() {
    let home = TempDir::new().unwrap();
    let output = cloudsave(home.path()).arg("sync").output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let error = stderr_json(&output);
    assert_eq!(error["error"]["code"], "NOT_CONFIGURED");
}

#[test]
fn test_init_twice_needs_force() {
    let home = TempDir::new().unwrap();
    init_local(home.path());
    assert!(home.path().join("config.json").exists());

    let output = cloudsave(home.path())
        .args(["init", "--backend", "local"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_json(&output)["error"]["code"], "ALREADY_INITIALIZED");

    cloudsave(home.path())
        .args(["init", "--backend", "local", "--force"])
        .assert()
        .success();
}

#[test]
fn test_missing_keys_reported() {
    let home = TempDir::new().unwrap();
    cloudsave(home.path())
        .args(["init", "--game-id", "vn"])
        .assert()
        .success();

    let output = cloudsave(home.path()).arg("sync").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let message = stderr_json(&output)["error"]["message"].as_str().unwrap().to_string();
    assert!(message.contains("Missing required configuration: api_base_url"));
}

#[test]
fn test_manifest_lists_newest_slot_and_persistent() {
    let home = TempDir::new().unwrap();
    let saves = TempDir::new().unwrap();
    fs::write(saves.path().join("persistent"), b"p").unwrap();
    fs::write(saves.path().join("1-1-LT1.save"), b"slot one").unwrap();

    let output = cloudsave(home.path())
        .arg("manifest")
        .arg("--save-dir")
        .arg(saves.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let manifest = stdout_json(&output);
    assert_eq!(manifest["persistent"]["size"], 1);
    assert_eq!(manifest["1-1-LT1.save"]["path"], "1-1-LT1.save");
    assert_eq!(manifest["1-1-LT1.save"]["checksum"].as_str().unwrap().len(), 64);
}

#[test]
fn test_local_sync_between_two_save_dirs() {
    let home = TempDir::new().unwrap();
    let device_a = TempDir::new().unwrap();
    let device_b = TempDir::new().unwrap();
    init_local(home.path());

    fs::write(device_a.path().join("persistent"), b"player data").unwrap();
    fs::write(device_a.path().join("2-1-LT1.save"), b"slot two").unwrap();

    let output = cloudsave(home.path())
        .arg("sync")
        .arg("--save-dir")
        .arg(device_a.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["outcome"], "performed");
    assert_eq!(outcome["report"]["uploaded"].as_array().unwrap().len(), 2);

    let output = cloudsave(home.path())
        .arg("sync")
        .arg("--save-dir")
        .arg(device_b.path())
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome = stdout_json(&output);
    assert_eq!(outcome["report"]["downloaded"].as_array().unwrap().len(), 2);
    assert_eq!(fs::read(device_b.path().join("2-1-LT1.save")).unwrap(), b"slot two");

    // Restored mtimes make the next comparison a no-op
    let output = cloudsave(home.path())
        .arg("plan")
        .arg("--save-dir")
        .arg(device_b.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan = stdout_json(&output)["plan"].clone();
    assert!(plan["uploads"].as_array().unwrap().is_empty());
    assert!(plan["downloads"].as_array().unwrap().is_empty());

    let output = cloudsave(home.path()).arg("status").output().unwrap();
    assert!(output.status.success());
    let status = stdout_json(&output);
    assert_eq!(status["backend"], "local");
    assert_eq!(status["recent_syncs"].as_array().unwrap().len(), 2);
}

#[test]
fn test_login_rejected_on_local_backend() {
    let home = TempDir::new().unwrap();
    init_local(home.path());

    let output = cloudsave(home.path())
        .args(["login", "alice", "--password", "pw"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}
