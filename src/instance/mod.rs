//! OpenStack instance lifecycle.
//!
//! [`OpenStackCloud`] bundles the API client, provider configuration, and
//! the process-wide floating-IP lock. [`Instance`] handles created from it
//! walk the lifecycle `create` → `post_create` → `wait_for_boot_completion`
//! → `delete`, with `exists` usable as an out-of-band query at any point.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use camino::Utf8PathBuf;
use tokio::sync::Mutex;
use uuid::Uuid;

mod boot;
mod create;
mod deps;
mod error;
mod network;
mod teardown;

#[cfg(test)]
mod tests;

pub use error::InstanceError;

use crate::api::{ComputeApi, FloatingIp, HttpComputeApi, Keypair, Volume};
use crate::config::OpenStackConfig;
use crate::machine::MachineSpec;
use crate::retry::RetryPolicy;

const ADDRESS_POLL: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(5));
const ASSOCIATION_POLL: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(1));
const DELETION_POLL: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(5));
const RELEASE_POLL: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(1));
const VOLUME_POLL: RetryPolicy = RetryPolicy::new(60, Duration::from_secs(2));
const AUTH_RETRY: RetryPolicy = RetryPolicy::new(4, Duration::from_secs(2));
const BOOT_POLL: RetryPolicy = RetryPolicy::new(120, Duration::from_secs(5)).quiet();
const BOOT_INITIAL_DELAY: Duration = Duration::from_secs(15);

/// Polling and retry tuning for lifecycle waits.
///
/// Defaults match production cadence; tests override with millisecond
/// intervals to keep timeout scenarios fast.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Polling {
    /// Poll for the server to report a network address.
    pub address: RetryPolicy,
    /// Poll for a floating IP association to be confirmed.
    pub association: RetryPolicy,
    /// Poll for the server to disappear after deletion.
    pub deletion: RetryPolicy,
    /// Poll for a released floating IP to disappear.
    pub release: RetryPolicy,
    /// Poll for a boot volume to become available.
    pub volume: RetryPolicy,
    /// Retry budget for transiently rejected authorization.
    pub auth: RetryPolicy,
    /// Poll for the first successful remote command after boot.
    pub boot: RetryPolicy,
    /// Delay before the first boot probe.
    pub boot_initial_delay: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            address: ADDRESS_POLL,
            association: ASSOCIATION_POLL,
            deletion: DELETION_POLL,
            release: RELEASE_POLL,
            volume: VOLUME_POLL,
            auth: AUTH_RETRY,
            boot: BOOT_POLL,
            boot_initial_delay: BOOT_INITIAL_DELAY,
        }
    }
}

/// Shared provider context from which instance handles are created.
///
/// All handles cloned from one cloud share the floating-IP lock, so
/// concurrent `post_create` and `delete` calls never claim or release the
/// same address twice.
#[derive(Clone)]
pub struct OpenStackCloud {
    pub(crate) api: Arc<dyn ComputeApi>,
    pub(crate) config: Arc<OpenStackConfig>,
    pub(crate) polling: Polling,
    run_id: String,
    floating_ip_lock: Arc<Mutex<()>>,
    instance_counter: Arc<AtomicU32>,
}

impl OpenStackCloud {
    /// Creates a cloud backed by the HTTP compute client.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Config`] when the provider configuration
    /// fails validation.
    pub fn new(config: OpenStackConfig) -> Result<Self, InstanceError> {
        config.validate()?;
        let api = Arc::new(HttpComputeApi::new(&config));
        Ok(Self::with_api(api, config))
    }

    /// Creates a cloud backed by an arbitrary [`ComputeApi`] implementation.
    /// Used by tests to substitute an in-memory double.
    #[must_use]
    pub fn with_api(api: Arc<dyn ComputeApi>, config: OpenStackConfig) -> Self {
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        Self {
            api,
            config: Arc::new(config),
            polling: Polling::default(),
            run_id,
            floating_ip_lock: Arc::new(Mutex::new(())),
            instance_counter: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Overrides the polling cadence.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &OpenStackConfig {
        &self.config
    }

    /// Returns the run-scoped identifier woven into resource names.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Creates a new instance handle for the given spec. Names are derived
    /// from a per-cloud counter and the run identifier, so every handle gets
    /// a unique instance and keypair name.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::Spec`] when the spec is missing required
    /// fields; call [`MachineSpec::apply_defaults`] first.
    pub fn instance(&self, spec: MachineSpec) -> Result<Instance, InstanceError> {
        spec.validate()?;
        let number = self.instance_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Instance {
            name: format!("skybench-vm-{number}-{}", self.run_id),
            key_name: format!("skybench-key-{number}-{}", self.run_id),
            cloud: self.clone(),
            spec,
            server_id: None,
            keypair: None,
            floating_ip: None,
            internal_ip: None,
            public_ip: None,
            boot_volume: None,
            hostname: None,
            bootable_at: None,
            scratch_mounts: Vec::new(),
        })
    }

    pub(crate) fn floating_ip_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.floating_ip_lock)
    }
}

/// Handle for one remote compute instance.
///
/// Runtime fields are populated as the lifecycle advances and never cleared:
/// a deleted handle is discarded, not reset.
pub struct Instance {
    cloud: OpenStackCloud,
    name: String,
    key_name: String,
    spec: MachineSpec,
    server_id: Option<String>,
    keypair: Option<Keypair>,
    floating_ip: Option<FloatingIp>,
    internal_ip: Option<String>,
    public_ip: Option<IpAddr>,
    boot_volume: Option<Volume>,
    hostname: Option<String>,
    bootable_at: Option<SystemTime>,
    scratch_mounts: Vec<Utf8PathBuf>,
}

impl Instance {
    /// Generated instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Generated keypair name.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Machine spec this handle was created with.
    #[must_use]
    pub const fn spec(&self) -> &MachineSpec {
        &self.spec
    }

    /// Provider-assigned server id, set after a successful `create`.
    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Keypair registered for this instance, set by `import_keypair`.
    #[must_use]
    pub const fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_ref()
    }

    /// Floating IP held by this instance, set after `post_create`.
    #[must_use]
    pub const fn floating_ip(&self) -> Option<&FloatingIp> {
        self.floating_ip.as_ref()
    }

    /// Private address on the configured network, set after `post_create`.
    #[must_use]
    pub fn internal_ip(&self) -> Option<&str> {
        self.internal_ip.as_deref()
    }

    /// Public address, set after `post_create`.
    #[must_use]
    pub const fn public_ip(&self) -> Option<IpAddr> {
        self.public_ip
    }

    /// Boot volume backing this instance, set by `create_dependencies` when
    /// booting from a volume.
    #[must_use]
    pub const fn boot_volume(&self) -> Option<&Volume> {
        self.boot_volume.as_ref()
    }

    /// Hostname reported by the instance, set once boot completes.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Timestamp of the first successful boot probe.
    #[must_use]
    pub const fn bootable_at(&self) -> Option<SystemTime> {
        self.bootable_at
    }

    /// Scratch mount points provisioned on the instance.
    #[must_use]
    pub fn scratch_mounts(&self) -> &[Utf8PathBuf] {
        &self.scratch_mounts
    }

    pub(crate) fn require_server_id(&self) -> Result<String, InstanceError> {
        self.server_id
            .clone()
            .ok_or_else(|| InstanceError::NotCreated {
                name: self.name.clone(),
            })
    }

    pub(crate) fn require_public_ip(&self) -> Result<IpAddr, InstanceError> {
        self.public_ip.ok_or_else(|| InstanceError::NoPublicAddress {
            name: self.name.clone(),
        })
    }
}
