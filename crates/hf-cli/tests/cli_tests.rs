//! End-to-end tests for the `hf` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn hf() -> Command {
    let mut cmd = Command::cargo_bin("hf").unwrap();
    cmd.current_dir(env!("CARGO_MANIFEST_DIR")).env_remove("LISTEN_ADDR");
    cmd
}

#[test]
fn test_cli_help() {
    hf().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("symbols"));
}

#[test]
fn test_cli_version() {
    hf().arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn apply_shows_before_and_after() {
    hf().args(["apply", "patches/patch_http.rs", "patch_test_handler()", "--call", "/home"])
        .assert()
        .success()
        .stdout(predicate::str::contains("handler::HttpSvc::index"))
        .stdout(predicate::str::contains("before: index page for /home"))
        .stdout(predicate::str::contains("after:  hello world"));
}

#[test]
fn check_prints_the_plan_as_json() {
    let output = hf()
        .args(["check", "patches/patch_recovery.rs", "patch_recovery_handler()", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["target"], "handler::HttpSvc::index");
    assert_eq!(plan["signature"], "fn(handler::HttpSvc, handler::Request) -> String");
    assert_eq!(plan["currently_patched"], false);
}

#[test]
fn failures_exit_with_a_diagnostic() {
    hf().args(["apply", "patches/patch_http.rs", "no_such_fn()"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hotfix::unresolved_symbol"));
}

#[test]
fn symbols_lists_every_set() {
    hf().args(["symbols"])
        .assert()
        .success()
        .stdout(predicate::str::contains("std::strings"))
        .stdout(predicate::str::contains("FuncPatch"))
        .stdout(predicate::str::contains("handler"));
}

#[test]
fn config_file_limits_are_applied() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("hotfix.toml");
    fs::write(&config, "[interpreter]\nmax_steps = 1\n").unwrap();
    hf().arg("--config")
        .arg(&config)
        .args(["apply", "patches/patch_http.rs", "patch_test_handler()"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step budget"));
}
