//! Command-line interface definitions for the `skybench` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `skybench` binary.
#[derive(Debug, Parser)]
#[command(
    name = "skybench",
    about = "Provision an OpenStack instance, run a command over SSH, and tear it down",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Provision an instance, wait for boot, run a command, and tear down.
    #[command(
        name = "run",
        about = "Provision an instance, run a command over SSH, and tear it down"
    )]
    Run(RunCommand),
}

/// Arguments for the `skybench run` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct RunCommand {
    /// Override the machine type (flavor name) for this run.
    ///
    /// The flavor is resolved by name against the compute API during
    /// provisioning; unknown names are rejected before any instance is
    /// created.
    #[arg(long, value_name = "FLAVOR")]
    pub(crate) machine_type: Option<String>,
    /// Override the image name for this run.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Override the availability zone for this run.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Provision a scratch mount point on the instance before running.
    #[arg(long, value_name = "PATH")]
    pub(crate) scratch_mount: Option<String>,
    /// Size in GB requested for the scratch mount.
    #[arg(long, value_name = "GB", requires = "scratch_mount")]
    pub(crate) scratch_size_gb: Option<u64>,
    /// Command to execute on the remote host (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}
