//! Core library for the skybench provisioning tool.
//!
//! The crate adapts a benchmarking harness's notion of a virtual machine to
//! the OpenStack compute API: instance creation, floating-IP association,
//! keypair import, boot-readiness probing over SSH, and teardown. The
//! lifecycle is `create` → `post_create` → `wait_for_boot_completion` →
//! `delete`, with auxiliary keypair and boot-volume provisioning around it.

pub mod api;
pub mod config;
pub mod exec;
pub mod instance;
pub mod machine;
pub mod retry;
pub mod run;
pub mod test_support;

pub use api::{ApiError, ComputeApi, HttpComputeApi};
pub use config::{ConfigError, OpenStackConfig, SshConfig};
pub use exec::{
    CommandOutput, CommandRunner, ExecError, ProcessCommandRunner, RemoteCommandOutput,
    SshExecutor,
};
pub use instance::{Instance, InstanceError, OpenStackCloud, Polling};
pub use machine::{DiskSpec, MachineSpec, MachineSpecBuilder, SpecError};
pub use retry::RetryPolicy;
pub use run::{RunError, RunOrchestrator};
