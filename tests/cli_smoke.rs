//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::predicate;

#[test]
fn cli_without_arguments_prints_usage_and_fails() {
    let mut cmd = cargo_bin_cmd!("burrow");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage: burrow"));
}

#[test]
fn help_lists_both_lifecycle_subcommands() {
    let mut cmd = cargo_bin_cmd!("burrow");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"));
}

#[test]
fn start_without_an_access_key_fails_with_a_clear_error() {
    let home = tempfile::tempdir().expect("temp home");
    let mut cmd = cargo_bin_cmd!("burrow");
    cmd.env_clear()
        .env("HOME", home.path())
        .arg("start");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("BROWSERSTACK_ACCESS_KEY is not set"));
}

#[test]
fn stop_succeeds_even_when_no_tunnel_was_started() {
    let home = tempfile::tempdir().expect("temp home");
    let mut cmd = cargo_bin_cmd!("burrow");
    cmd.env_clear()
        .env("HOME", home.path())
        .env("BROWSERSTACK_ACCESS_KEY", "smoke-test-key")
        .arg("stop");
    cmd.assert().success();
}
