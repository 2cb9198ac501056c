//! Machine and disk specifications consumed by the instance lifecycle.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::config::OpenStackConfig;

/// Parameters describing the instance to provision.
///
/// Fields left unset by the caller are filled from provider defaults via
/// [`MachineSpec::apply_defaults`] before the spec is used.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineSpec {
    /// Flavor name (for example `m1.small`).
    pub machine_type: Option<String>,
    /// Target availability zone (for example `nova`).
    pub zone: Option<String>,
    /// Image name the instance (or its boot volume) is created from.
    pub image: Option<String>,
    /// Whether the instance boots from a pre-created volume.
    pub boot_from_volume: Option<bool>,
    /// Boot volume size in GB when booting from a volume.
    pub volume_size_gb: Option<u64>,
}

impl MachineSpec {
    /// Starts a builder for a [`MachineSpec`].
    #[must_use]
    pub fn builder() -> MachineSpecBuilder {
        MachineSpecBuilder::default()
    }

    /// Fills unset fields with provider defaults. Pure defaulting, no I/O.
    pub fn apply_defaults(&mut self, config: &OpenStackConfig) {
        if self.machine_type.is_none() {
            self.machine_type = Some(config.default_machine_type.clone());
        }
        if self.zone.is_none() {
            self.zone = Some(config.default_zone.clone());
        }
        if self.image.is_none() {
            self.image = Some(config.default_image.clone());
        }
        if self.boot_from_volume.is_none() {
            self.boot_from_volume = Some(config.boot_from_volume);
        }
        if self.volume_size_gb.is_none() {
            self.volume_size_gb = Some(config.volume_size_gb);
        }
    }

    /// Validates the spec, returning a descriptive error when a required
    /// field is missing or empty.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Missing`] when machine type, zone, or image is
    /// unset or blank.
    pub fn validate(&self) -> Result<(), SpecError> {
        Self::require(self.machine_type.as_deref(), "machine_type")?;
        Self::require(self.zone.as_deref(), "zone")?;
        Self::require(self.image.as_deref(), "image")?;
        Ok(())
    }

    /// Whether the instance boots from a pre-created volume.
    #[must_use]
    pub fn boots_from_volume(&self) -> bool {
        self.boot_from_volume.unwrap_or(false)
    }

    /// Boot volume size in GB, zero when unset.
    #[must_use]
    pub fn volume_size(&self) -> u64 {
        self.volume_size_gb.unwrap_or(0)
    }

    pub(crate) fn require_machine_type(&self) -> Result<&str, SpecError> {
        Self::require(self.machine_type.as_deref(), "machine_type")
    }

    pub(crate) fn require_zone(&self) -> Result<&str, SpecError> {
        Self::require(self.zone.as_deref(), "zone")
    }

    pub(crate) fn require_image(&self) -> Result<&str, SpecError> {
        Self::require(self.image.as_deref(), "image")
    }

    fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, SpecError> {
        match value {
            Some(inner) if !inner.trim().is_empty() => Ok(inner),
            _ => Err(SpecError::Missing(field.to_owned())),
        }
    }
}

/// Builder for [`MachineSpec`]. Unset fields stay `None` so that defaulting
/// can fill them later.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MachineSpecBuilder {
    machine_type: Option<String>,
    zone: Option<String>,
    image: Option<String>,
    boot_from_volume: Option<bool>,
    volume_size_gb: Option<u64>,
}

impl MachineSpecBuilder {
    /// Sets the flavor name.
    #[must_use]
    pub fn machine_type(mut self, value: impl Into<String>) -> Self {
        self.machine_type = Some(value.into());
        self
    }

    /// Sets the availability zone.
    #[must_use]
    pub fn zone(mut self, value: impl Into<String>) -> Self {
        self.zone = Some(value.into());
        self
    }

    /// Sets the image name.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = Some(value.into());
        self
    }

    /// Sets the boot-from-volume flag.
    #[must_use]
    pub const fn boot_from_volume(mut self, value: bool) -> Self {
        self.boot_from_volume = Some(value);
        self
    }

    /// Sets the boot volume size in GB.
    #[must_use]
    pub const fn volume_size_gb(mut self, value: u64) -> Self {
        self.volume_size_gb = Some(value);
        self
    }

    /// Builds the [`MachineSpec`] without validating; call
    /// [`MachineSpec::apply_defaults`] and [`MachineSpec::validate`] before
    /// provisioning.
    #[must_use]
    pub fn build(self) -> MachineSpec {
        MachineSpec {
            machine_type: self.machine_type.map(|value| value.trim().to_owned()),
            zone: self.zone.map(|value| value.trim().to_owned()),
            image: self.image.map(|value| value.trim().to_owned()),
            boot_from_volume: self.boot_from_volume,
            volume_size_gb: self.volume_size_gb,
        }
    }
}

/// Scratch disk parameters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskSpec {
    /// Requested size in GB.
    pub size_gb: u64,
    /// Mount point the benchmark expects the disk at.
    pub mount_point: Utf8PathBuf,
}

impl DiskSpec {
    /// Creates a new disk spec.
    #[must_use]
    pub fn new(size_gb: u64, mount_point: impl AsRef<Utf8Path>) -> Self {
        Self {
            size_gb,
            mount_point: mount_point.as_ref().to_owned(),
        }
    }
}

/// Errors raised when a machine spec is incomplete.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SpecError {
    /// Raised when a required field is unset or blank.
    #[error("missing or empty field: {0}")]
    Missing(String),
}
