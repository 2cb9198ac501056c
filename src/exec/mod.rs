//! Remote command execution over the system `ssh` client, wrapping command
//! invocations while preserving remote exit codes.

use std::ffi::OsString;
use std::net::IpAddr;

mod types;
mod util;

pub use types::{CommandOutput, CommandRunner, ExecError, ProcessCommandRunner};
pub use util::expand_tilde;

use crate::config::{ConfigError, SshConfig};

/// Result of running a command on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit code reported by the remote command, if available.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the remote exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Executes commands on a remote host through the configured `ssh` binary.
#[derive(Clone, Debug)]
pub struct SshExecutor<R: CommandRunner> {
    config: SshConfig,
    runner: R,
}

impl SshExecutor<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, ConfigError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> SshExecutor<R> {
    /// Creates a new executor using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration validation fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    /// Executes `command` on `host` over SSH and returns the remote exit
    /// code and captured output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Spawn`] when the `ssh` binary cannot be started.
    ///
    /// # Security
    ///
    /// `command` is passed verbatim to the SSH client; callers must ensure
    /// any untrusted input is quoted upstream.
    pub fn run(&self, host: IpAddr, command: &str) -> Result<RemoteCommandOutput, ExecError> {
        let args = self.build_ssh_args(host, command);
        let output = self.runner.run(&self.config.ssh_bin, &args)?;

        Ok(RemoteCommandOutput {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    fn build_ssh_args(&self, host: IpAddr, command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.config.ssh_port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.ssh_identity_file {
            let expanded = expand_tilde(identity_file);
            args.push(OsString::from("-i"));
            args.push(OsString::from(expanded));
        }

        if self.config.ssh_batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.ssh_strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.ssh_known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.ssh_known_hosts_file
            )));
        }

        args.push(OsString::from(format!(
            "{}@{host}",
            self.config.ssh_user
        )));
        args.push(OsString::from(command));
        args
    }
}

#[cfg(test)]
mod tests;
