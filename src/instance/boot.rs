//! Boot readiness probing and scratch disk provisioning over SSH.

use std::borrow::Cow;
use std::time::SystemTime;

use camino::Utf8PathBuf;
use shell_escape::unix::escape;
use tokio::time::sleep;

use crate::exec::{CommandRunner, SshExecutor};
use crate::machine::DiskSpec;
use crate::retry::retry;

use super::{Instance, InstanceError};

impl Instance {
    /// Waits until the instance answers a trivial remote command.
    ///
    /// Sleeps a fixed initial delay, then probes `hostname` over SSH at a
    /// fixed interval with per-attempt errors suppressed from logs. The
    /// first success records the hostname and the first-boot timestamp;
    /// neither is overwritten by later calls.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::NoPublicAddress`] before `post_create`, and
    /// the final probe failure once the retry budget is exhausted.
    pub async fn wait_for_boot_completion<R: CommandRunner>(
        &mut self,
        executor: &SshExecutor<R>,
    ) -> Result<(), InstanceError> {
        let host = self.require_public_ip()?;
        let polling = self.cloud.polling;

        sleep(polling.boot_initial_delay).await;

        let hostname = retry(polling.boot, "boot completion", || async {
            let output = executor.run(host, "hostname")?;
            if output.is_success() {
                Ok(output.stdout.trim().to_owned())
            } else {
                Err(InstanceError::RemoteCommandFailed {
                    command: String::from("hostname"),
                    status: output
                        .exit_code
                        .map_or_else(|| String::from("unknown"), |code| code.to_string()),
                })
            }
        })
        .await?;

        if self.bootable_at.is_none() {
            self.bootable_at = Some(SystemTime::now());
        }
        if self.hostname.is_none() {
            self.hostname = Some(hostname);
        }
        tracing::info!(instance = %self.name, hostname = ?self.hostname, "boot completed");
        Ok(())
    }

    /// Provisions a scratch mount point on the instance.
    ///
    /// A real attached volume is substituted with a directory under `/tmp`
    /// on the instance's root disk; the effective mount point is recorded on
    /// the handle and returned so callers can point benchmarks at it.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::NoPublicAddress`] before `post_create`, and
    /// [`InstanceError::RemoteCommandFailed`] when the directory cannot be
    /// created.
    pub async fn create_scratch_disk<R: CommandRunner>(
        &mut self,
        disk: &DiskSpec,
        executor: &SshExecutor<R>,
    ) -> Result<Utf8PathBuf, InstanceError> {
        let host = self.require_public_ip()?;

        let sanitized = disk.mount_point.as_str().replace('/', "_");
        let scratch_path = Utf8PathBuf::from(format!("/tmp/disks/{sanitized}"));
        let command = format!("mkdir -p {}", escape(Cow::from(scratch_path.as_str())));

        let output = executor.run(host, &command)?;
        if !output.is_success() {
            return Err(InstanceError::RemoteCommandFailed {
                command,
                status: output
                    .exit_code
                    .map_or_else(|| String::from("unknown"), |code| code.to_string()),
            });
        }

        tracing::info!(instance = %self.name, mount = %scratch_path, "scratch mount ready");
        self.scratch_mounts.push(scratch_path.clone());
        Ok(scratch_path)
    }
}
