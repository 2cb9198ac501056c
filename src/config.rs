//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::machine::MachineSpec;

/// OpenStack provider configuration derived from environment variables,
/// configuration files, and CLI flags.
///
/// The `OS` prefix matches the environment variables OpenStack tooling
/// conventionally exports (`OS_AUTH_TOKEN`, `OS_COMPUTE_URL`, ...).
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OS")]
pub struct OpenStackConfig {
    /// Base URL of the compute API endpoint. This value is required.
    pub compute_url: String,
    /// Pre-issued token used to authenticate API calls. Token issuance and
    /// refresh happen outside this crate. This value is required.
    pub auth_token: String,
    /// Flavor name used when a machine spec leaves the type unset.
    #[ortho_config(default = "m1.small".to_owned())]
    pub default_machine_type: String,
    /// Availability zone used when a machine spec leaves the zone unset.
    #[ortho_config(default = "nova".to_owned())]
    pub default_zone: String,
    /// Image name used when a machine spec leaves the image unset.
    #[ortho_config(default = "ubuntu-14.04".to_owned())]
    pub default_image: String,
    /// Floating IP pool public addresses are drawn from.
    #[ortho_config(default = "public".to_owned())]
    pub public_network: String,
    /// Label of the private network instances boot onto.
    #[ortho_config(default = "private".to_owned())]
    pub private_network: String,
    /// Security group applied to every instance.
    #[ortho_config(default = "skybench".to_owned())]
    pub security_group: String,
    /// Whether instances expose metadata through a config drive instead of
    /// the metadata service.
    #[ortho_config(default = false)]
    pub config_drive: bool,
    /// Whether instances boot from a pre-created volume instead of an image.
    #[ortho_config(default = false)]
    pub boot_from_volume: bool,
    /// Size of boot volumes in GB when booting from a volume.
    #[ortho_config(default = 20)]
    pub volume_size_gb: u64,
    /// Path to the SSH public key registered as the instance keypair.
    /// Supports tilde expansion (`~/.ssh/id_rsa.pub`).
    #[ortho_config(default = "~/.ssh/id_rsa.pub".to_owned())]
    pub public_key_path: String,
    /// Run-scoped identifier woven into instance and keypair names. A random
    /// identifier is generated when unset.
    pub run_id: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [{}] in skybench.toml",
            metadata.description, metadata.env_var, metadata.toml_key, metadata.section
        )));
    }
    Ok(())
}

impl OpenStackConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skybench")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds a [`MachineSpec`] with every field filled from the configured
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_spec(&self) -> Result<MachineSpec, ConfigError> {
        self.validate()?;
        let mut spec = MachineSpec::builder().build();
        spec.apply_defaults(self);
        Ok(spec)
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.compute_url,
            &FieldMetadata::new(
                "compute API endpoint",
                "OS_COMPUTE_URL",
                "compute_url",
                "openstack",
            ),
        )?;
        require_field(
            &self.auth_token,
            &FieldMetadata::new("API auth token", "OS_AUTH_TOKEN", "auth_token", "openstack"),
        )?;
        require_field(
            &self.default_machine_type,
            &FieldMetadata::new(
                "machine type",
                "OS_DEFAULT_MACHINE_TYPE",
                "default_machine_type",
                "openstack",
            ),
        )?;
        require_field(
            &self.default_zone,
            &FieldMetadata::new(
                "availability zone",
                "OS_DEFAULT_ZONE",
                "default_zone",
                "openstack",
            ),
        )?;
        require_field(
            &self.default_image,
            &FieldMetadata::new("VM image", "OS_DEFAULT_IMAGE", "default_image", "openstack"),
        )?;
        require_field(
            &self.public_network,
            &FieldMetadata::new(
                "floating IP pool",
                "OS_PUBLIC_NETWORK",
                "public_network",
                "openstack",
            ),
        )?;
        require_field(
            &self.private_network,
            &FieldMetadata::new(
                "private network label",
                "OS_PRIVATE_NETWORK",
                "private_network",
                "openstack",
            ),
        )?;
        require_field(
            &self.security_group,
            &FieldMetadata::new(
                "security group",
                "OS_SECURITY_GROUP",
                "security_group",
                "openstack",
            ),
        )?;
        require_field(
            &self.public_key_path,
            &FieldMetadata::new(
                "SSH public key path",
                "OS_PUBLIC_KEY_PATH",
                "public_key_path",
                "openstack",
            ),
        )?;
        if self.volume_size_gb == 0 {
            return Err(ConfigError::Invalid(String::from(
                "volume_size_gb must be greater than zero",
            )));
        }
        Ok(())
    }
}

/// SSH settings used to reach instances once they are network-ready.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SKYBENCH_SSH",
    discovery(
        app_name = "skybench",
        env_var = "SKYBENCH_CONFIG_PATH",
        config_file_name = "skybench.toml",
        dotfile_name = ".skybench.toml",
        project_file_name = "skybench.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Remote user to connect as.
    #[ortho_config(default = "ubuntu".to_owned())]
    pub ssh_user: String,
    /// TCP port the remote SSH daemon listens on.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Path to the SSH private key file for remote authentication. Supports
    /// tilde expansion (`~/.ssh/id_rsa`). Optional; when not provided, SSH
    /// falls back to default key locations. Validation rejects empty or
    /// whitespace-only values.
    pub ssh_identity_file: Option<String>,
    /// Whether to force batch mode for SSH to avoid password prompts.
    #[ortho_config(default = true)]
    pub ssh_batch_mode: bool,
    /// Whether to enforce host key checking; defaults to disabling to smooth
    /// ephemeral hosts.
    #[ortho_config(default = false)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; defaults to `/dev/null` for ephemeral hosts.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub ssh_known_hosts_file: String,
}

impl SshConfig {
    /// Loads SSH settings without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("skybench")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Ensures configuration values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when any required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_field(
            &self.ssh_bin,
            &FieldMetadata::new("ssh binary", "SKYBENCH_SSH_SSH_BIN", "ssh_bin", "ssh"),
        )?;
        require_field(
            &self.ssh_user,
            &FieldMetadata::new("ssh user", "SKYBENCH_SSH_SSH_USER", "ssh_user", "ssh"),
        )?;
        if let Some(identity) = self.ssh_identity_file.as_deref()
            && identity.trim().is_empty()
        {
            return Err(ConfigError::Invalid(String::from(
                "ssh_identity_file must not be blank when set",
            )));
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is present but unusable.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
