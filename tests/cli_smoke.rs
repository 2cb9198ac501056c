//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn cli_help_lists_the_run_subcommand() {
    let mut cmd = cargo_bin_cmd!("skybench");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run"));
}

#[test]
fn cli_without_arguments_prints_usage_and_fails() {
    let mut cmd = cargo_bin_cmd!("skybench");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn cli_run_requires_a_command() {
    let mut cmd = cargo_bin_cmd!("skybench");
    cmd.arg("run");
    cmd.assert().failure();
}
