//! Error types for the instance lifecycle.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::exec::ExecError;
use crate::machine::SpecError;

/// Errors raised by the instance lifecycle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InstanceError {
    /// Raised when the provider configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when the machine spec is missing required fields.
    #[error("invalid machine spec: {0}")]
    Spec(String),
    /// Raised when no flavor matches the requested machine type.
    #[error("flavor '{name}' not found")]
    FlavorNotFound {
        /// Requested flavor name.
        name: String,
    },
    /// Raised when no image matches the requested name.
    #[error("image '{name}' not found")]
    ImageNotFound {
        /// Requested image name.
        name: String,
    },
    /// Raised when no network carries the configured label.
    #[error("network '{label}' not found")]
    NetworkNotFound {
        /// Configured network label.
        label: String,
    },
    /// Raised when an operation requires a created instance.
    #[error("instance {name} has not been created")]
    NotCreated {
        /// Instance name.
        name: String,
    },
    /// Raised when an operation requires a public address.
    #[error("instance {name} has no public address yet")]
    NoPublicAddress {
        /// Instance name.
        name: String,
    },
    /// Raised when the instance reports no address on the configured
    /// private network.
    #[error("instance {name} has no address on network {network}")]
    MissingAddress {
        /// Instance name.
        name: String,
        /// Network label that was expected to carry an address.
        network: String,
    },
    /// Raised when a bounded poll exhausts its attempt budget.
    #[error("timeout waiting for {action} on instance {name}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Instance name.
        name: String,
    },
    /// Raised when teardown leaves the server visible in the API.
    #[error("instance {name} still present after teardown")]
    ResidualResource {
        /// Instance name.
        name: String,
    },
    /// Raised when a boot volume never becomes available.
    #[error("volume {id} never became available (status {status})")]
    VolumeUnavailable {
        /// Volume identifier.
        id: String,
        /// Last status reported by the provider.
        status: String,
    },
    /// Raised when the configured public key file cannot be read.
    #[error("failed to read public key {path}: {message}")]
    PublicKey {
        /// Path that was read.
        path: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when a remote command exits with a non-zero status.
    #[error("remote command '{command}' exited with status {status}")]
    RemoteCommandFailed {
        /// Command executed on the instance.
        command: String,
        /// Exit status, or `unknown` when the remote side reported none.
        status: String,
    },
    /// Raised when the remote command could not be executed at all.
    #[error(transparent)]
    Remote(#[from] ExecError),
    /// Wrapper for provider API failures.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<ConfigError> for InstanceError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<SpecError> for InstanceError {
    fn from(value: SpecError) -> Self {
        Self::Spec(value.to_string())
    }
}
