//! Orchestrates one end-to-end benchmark run.
//!
//! The run workflow provisions dependencies and an instance, waits for
//! networking and boot, optionally prepares a scratch mount, executes a
//! remote command over SSH, and tears everything down. Remote exit codes are
//! preserved so callers observe the same status locally. Teardown is always
//! attempted; when it fails after another error, the note is appended to the
//! surfaced message.

use std::fmt::Display;

use thiserror::Error;

use crate::exec::{CommandRunner, ExecError, RemoteCommandOutput, SshExecutor};
use crate::instance::{Instance, InstanceError, OpenStackCloud};
use crate::machine::{DiskSpec, MachineSpec};

/// Errors surfaced while performing a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Raised when keypair or volume provisioning fails.
    #[error("failed to provision dependencies: {message}")]
    Dependencies {
        /// Human-readable description of the failure, including any
        /// teardown note.
        message: String,
        /// Underlying lifecycle error.
        #[source]
        source: InstanceError,
    },
    /// Raised when instance creation fails.
    #[error("failed to create instance: {message}")]
    Provision {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying lifecycle error.
        #[source]
        source: InstanceError,
    },
    /// Raised when the instance never becomes reachable.
    #[error("instance did not become ready: {message}")]
    Wait {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying lifecycle error.
        #[source]
        source: InstanceError,
    },
    /// Raised when scratch provisioning fails.
    #[error("scratch disk provisioning failed: {message}")]
    Scratch {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying lifecycle error.
        #[source]
        source: InstanceError,
    },
    /// Raised when the remote command fails to start.
    #[error("remote command failed to start: {message}")]
    Remote {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying execution error.
        #[source]
        source: ExecError,
    },
    /// Raised when teardown fails after the primary operation succeeded.
    #[error("failed to tear down instance: {0}")]
    Teardown(#[source] InstanceError),
}

/// Executes the run flow using the provided cloud and SSH executor.
pub struct RunOrchestrator<R: CommandRunner> {
    cloud: OpenStackCloud,
    executor: SshExecutor<R>,
}

impl<R: CommandRunner> RunOrchestrator<R> {
    /// Creates a new orchestrator.
    #[must_use]
    pub const fn new(cloud: OpenStackCloud, executor: SshExecutor<R>) -> Self {
        Self { cloud, executor }
    }

    /// Runs the end-to-end workflow and returns the remote command output.
    ///
    /// The remote exit code is returned even when non-zero. Teardown is
    /// always attempted; when teardown fails the error is surfaced even if
    /// the remote command succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when provisioning, readiness checks, scratch
    /// provisioning, remote execution, or teardown fail.
    pub async fn execute(
        &self,
        spec: MachineSpec,
        scratch: Option<&DiskSpec>,
        remote_command: &str,
    ) -> Result<RemoteCommandOutput, RunError> {
        let mut instance = self.cloud.instance(spec).map_err(|err| {
            RunError::Provision {
                message: err.to_string(),
                source: err,
            }
        })?;

        if let Err(err) = instance.create_dependencies().await {
            let message = self.abort(&mut instance, &err).await;
            return Err(RunError::Dependencies {
                message,
                source: err,
            });
        }

        if let Err(err) = instance.create().await {
            let message = self.abort(&mut instance, &err).await;
            return Err(RunError::Provision {
                message,
                source: err,
            });
        }

        if let Err(err) = instance.post_create().await {
            let message = self.abort(&mut instance, &err).await;
            return Err(RunError::Wait {
                message,
                source: err,
            });
        }

        if let Err(err) = instance.wait_for_boot_completion(&self.executor).await {
            let message = self.abort(&mut instance, &err).await;
            return Err(RunError::Wait {
                message,
                source: err,
            });
        }

        if let Some(disk) = scratch
            && let Err(err) = instance.create_scratch_disk(disk, &self.executor).await
        {
            let message = self.abort(&mut instance, &err).await;
            return Err(RunError::Scratch {
                message,
                source: err,
            });
        }

        let host = match instance.public_ip() {
            Some(host) => host,
            None => {
                let err = InstanceError::NoPublicAddress {
                    name: instance.name().to_owned(),
                };
                let message = self.abort(&mut instance, &err).await;
                return Err(RunError::Wait {
                    message,
                    source: err,
                });
            }
        };

        let output = match self.executor.run(host, remote_command) {
            Ok(output) => output,
            Err(err) => {
                let message = self.abort(&mut instance, &err).await;
                return Err(RunError::Remote {
                    message,
                    source: err,
                });
            }
        };

        Self::teardown(&mut instance)
            .await
            .map_err(RunError::Teardown)?;

        Ok(output)
    }

    /// Deletes the instance and its dependencies, in that order.
    async fn teardown(instance: &mut Instance) -> Result<(), InstanceError> {
        instance.delete().await?;
        instance.delete_dependencies().await
    }

    /// Best-effort teardown after a failure; the returned message carries
    /// the original error plus a note when teardown itself failed.
    async fn abort<E: Display>(&self, instance: &mut Instance, err: &E) -> String {
        let teardown_error = Self::teardown(instance).await.err();
        append_teardown_note(err.to_string(), teardown_error.as_ref())
    }
}

fn append_teardown_note<E: Display>(message: String, teardown_error: Option<&E>) -> String {
    if let Some(teardown) = teardown_error {
        format!("{message} (teardown also failed: {teardown})")
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{RunError, RunOrchestrator, append_teardown_note};
    use crate::config::SshConfig;
    use crate::exec::SshExecutor;
    use crate::instance::OpenStackCloud;
    use crate::machine::{DiskSpec, MachineSpec};
    use crate::test_support::{FakeComputeApi, ScriptedRunner, fast_polling, sample_config};

    struct Harness {
        cloud: OpenStackCloud,
        fake: FakeComputeApi,
        runner: ScriptedRunner,
        _keydir: TempDir,
    }

    fn harness() -> Harness {
        let fake = FakeComputeApi::new();
        fake.seed_flavor("flavor-1", "m1.small");
        fake.seed_image("image-1", "ubuntu-14.04");
        fake.seed_network("net-1", "private");

        let keydir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let key_path = keydir.path().join("id_rsa.pub");
        std::fs::write(&key_path, "ssh-rsa AAAATEST bench@host\n")
            .unwrap_or_else(|err| panic!("write key: {err}"));
        let key_str = key_path
            .to_str()
            .unwrap_or_else(|| panic!("temp path should be utf8"))
            .to_owned();

        let cloud = OpenStackCloud::with_api(Arc::new(fake.clone()), sample_config(&key_str))
            .with_polling(fast_polling());
        Harness {
            cloud,
            fake,
            runner: ScriptedRunner::new(),
            _keydir: keydir,
        }
    }

    fn orchestrator(h: &Harness) -> RunOrchestrator<ScriptedRunner> {
        let config = SshConfig {
            ssh_bin: String::from("ssh"),
            ssh_user: String::from("ubuntu"),
            ssh_port: 22,
            ssh_identity_file: None,
            ssh_batch_mode: true,
            ssh_strict_host_key_checking: false,
            ssh_known_hosts_file: String::from("/dev/null"),
        };
        let executor = SshExecutor::new(config, h.runner.clone())
            .unwrap_or_else(|err| panic!("executor: {err}"));
        RunOrchestrator::new(h.cloud.clone(), executor)
    }

    fn default_spec(h: &Harness) -> MachineSpec {
        let mut spec = MachineSpec::builder().build();
        spec.apply_defaults(h.cloud.config());
        spec
    }

    #[tokio::test]
    async fn execute_runs_the_command_and_tears_down() {
        let h = harness();
        h.runner.push_output(Some(0), "bench-host\n", ""); // boot probe
        h.runner.push_output(Some(3), "result\n", ""); // benchmark command
        let orchestrator = orchestrator(&h);

        let output = orchestrator
            .execute(default_spec(&h), None, "uname -a")
            .await
            .unwrap_or_else(|err| panic!("execute: {err}"));

        assert_eq!(output.exit_code, Some(3), "remote exit code is preserved");
        assert_eq!(output.stdout, "result\n");
        // Teardown removed the keypair along with the server.
        assert!(!h.fake.keypair_exists("skybench-key-0-testrun"));
        assert_eq!(h.fake.create_requests().len(), 1);
    }

    #[tokio::test]
    async fn execute_provisions_scratch_before_the_command() {
        let h = harness();
        h.runner.push_output(Some(0), "bench-host\n", ""); // boot probe
        h.runner.push_success(); // mkdir for scratch mount
        h.runner.push_output(Some(0), "done\n", ""); // benchmark command
        let orchestrator = orchestrator(&h);

        let disk = DiskSpec::new(100, "/scratch");
        orchestrator
            .execute(default_spec(&h), Some(&disk), "true")
            .await
            .unwrap_or_else(|err| panic!("execute: {err}"));

        let rendered: Vec<String> = h
            .runner
            .invocations()
            .iter()
            .map(crate::test_support::CommandInvocation::command_string)
            .collect();
        assert!(
            rendered
                .iter()
                .any(|cmd| cmd.contains("mkdir -p /tmp/disks/_scratch")),
            "rendered: {rendered:?}"
        );
    }

    #[tokio::test]
    async fn execute_tears_down_when_boot_never_completes() {
        let h = harness();
        // No scripted responses: every boot probe fails.
        let orchestrator = orchestrator(&h);

        let err = orchestrator
            .execute(default_spec(&h), None, "true")
            .await
            .expect_err("boot should time out");

        assert!(matches!(err, RunError::Wait { .. }));
        assert!(
            !h.fake.keypair_exists("skybench-key-0-testrun"),
            "failed runs must clean up their dependencies"
        );
    }

    #[tokio::test]
    async fn execute_fails_fast_on_unresolvable_specs() {
        let h = harness();
        let orchestrator = orchestrator(&h);
        let mut spec = MachineSpec::builder().machine_type("no-such-flavor").build();
        spec.apply_defaults(h.cloud.config());

        let err = orchestrator
            .execute(spec, None, "true")
            .await
            .expect_err("unknown flavor should fail");
        assert!(matches!(err, RunError::Provision { .. }));
    }

    #[test]
    fn teardown_note_is_appended_only_on_failure() {
        let plain = append_teardown_note::<String>(String::from("boom"), None);
        assert_eq!(plain, "boom");

        let note = String::from("teardown boom");
        let with_note = append_teardown_note(String::from("boom"), Some(&note));
        assert_eq!(with_note, "boom (teardown also failed: teardown boom)");
    }
}
