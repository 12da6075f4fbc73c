//! Smoke tests for the qatrack CLI.
//!
//! These tests verify basic CLI functionality:
//! - `qatrack --version` outputs version info
//! - `qatrack --help` lists the commands
//! - bad arguments fail before anything runs

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the qatrack binary.
fn qatrack() -> Command {
    Command::new(env!("CARGO_BIN_EXE_qatrack"))
}

#[test]
fn test_version_flag() {
    qatrack()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("qatrack"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    qatrack()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("metrics"));
}

#[test]
fn test_serve_help_lists_flags() {
    qatrack()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--store"));
}

#[test]
fn test_missing_subcommand_fails() {
    qatrack().assert().failure();
}

#[test]
fn test_unknown_store_rejected() {
    qatrack()
        .args(["serve", "--store", "redis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown store"));
}
