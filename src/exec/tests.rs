//! Unit tests for SSH argument construction and process execution.

use std::net::{IpAddr, Ipv4Addr};

use super::{ProcessCommandRunner, SshExecutor};
use crate::config::SshConfig;
use crate::exec::CommandRunner;
use crate::test_support::ScriptedRunner;

fn ssh_config() -> SshConfig {
    SshConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: String::from("ubuntu"),
        ssh_port: 22,
        ssh_identity_file: None,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
    }
}

fn localhost() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

#[test]
fn run_passes_command_and_target_to_ssh() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "vm-host\n", "");
    let executor = SshExecutor::new(ssh_config(), runner.clone())
        .unwrap_or_else(|err| panic!("executor: {err}"));

    let output = executor
        .run(localhost(), "hostname")
        .unwrap_or_else(|err| panic!("run: {err}"));

    assert!(output.is_success());
    assert_eq!(output.stdout, "vm-host\n");

    let invocations = runner.invocations();
    let first = invocations
        .first()
        .unwrap_or_else(|| panic!("one invocation expected"));
    assert_eq!(first.program, "ssh");
    let rendered = first.command_string();
    assert!(rendered.contains("-p 22"), "rendered: {rendered}");
    assert!(rendered.contains("BatchMode=yes"), "rendered: {rendered}");
    assert!(
        rendered.contains("StrictHostKeyChecking=no"),
        "rendered: {rendered}"
    );
    assert!(
        rendered.contains("UserKnownHostsFile=/dev/null"),
        "rendered: {rendered}"
    );
    assert!(
        rendered.ends_with("ubuntu@127.0.0.1 hostname"),
        "rendered: {rendered}"
    );
}

#[test]
fn run_includes_identity_file_when_configured() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "", "");
    let config = SshConfig {
        ssh_identity_file: Some(String::from("/keys/bench")),
        ..ssh_config()
    };
    let executor =
        SshExecutor::new(config, runner.clone()).unwrap_or_else(|err| panic!("executor: {err}"));

    executor
        .run(localhost(), "true")
        .unwrap_or_else(|err| panic!("run: {err}"));

    let invocations = runner.invocations();
    let first = invocations
        .first()
        .unwrap_or_else(|| panic!("one invocation expected"));
    assert!(
        first.command_string().contains("-i /keys/bench"),
        "rendered: {}",
        first.command_string()
    );
}

#[test]
fn run_preserves_nonzero_remote_exit_codes() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(7), "", "simulated failure");
    let executor = SshExecutor::new(ssh_config(), runner)
        .unwrap_or_else(|err| panic!("executor: {err}"));

    let output = executor
        .run(localhost(), "false")
        .unwrap_or_else(|err| panic!("run: {err}"));

    assert_eq!(output.exit_code, Some(7));
    assert!(!output.is_success());
}

#[test]
fn process_runner_captures_output() {
    let output = ProcessCommandRunner
        .run(
            "sh",
            &[
                std::ffi::OsString::from("-c"),
                std::ffi::OsString::from("echo captured"),
            ],
        )
        .unwrap_or_else(|err| panic!("spawn: {err}"));

    assert!(output.is_success());
    assert_eq!(output.stdout.trim(), "captured");
}

#[test]
fn process_runner_reports_missing_binaries() {
    let result = ProcessCommandRunner.run("skybench-no-such-binary", &[]);
    assert!(result.is_err());
}
