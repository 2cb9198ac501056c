//! Compute API client seam.
//!
//! The instance lifecycle talks to the provider exclusively through the
//! [`ComputeApi`] trait so tests can substitute an in-memory double. The
//! production implementation is [`HttpComputeApi`], a thin typed layer over
//! the provider's REST endpoints.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

mod http;
mod types;

pub use http::HttpComputeApi;
pub use types::{
    Address, BlockDeviceMapping, CreateServer, CreateVolume, Flavor, FloatingIp, Image, Keypair,
    Network, Server, Volume,
};

/// Future returned by compute API operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Resource collections exposed by the provider: servers, flavors, images,
/// networks, keypairs, floating IPs, and volumes.
///
/// Find-style operations return `None` (or an empty list) rather than an
/// error when nothing matches; get-by-id operations return
/// [`ApiError::NotFound`] for unknown identifiers.
pub trait ComputeApi: Send + Sync {
    /// Creates a server and returns the provider's view of it.
    fn create_server<'a>(&'a self, request: &'a CreateServer) -> ApiFuture<'a, Server>;

    /// Fetches a server by id.
    fn server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Server>;

    /// Lists servers whose name matches exactly.
    fn servers_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Server>>;

    /// Requests deletion of a server by id.
    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()>;

    /// Finds a flavor by name.
    fn flavor_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Flavor>>;

    /// Finds an image by name.
    fn image_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Image>>;

    /// Finds a network by label.
    fn network_labelled<'a>(&'a self, label: &'a str) -> ApiFuture<'a, Option<Network>>;

    /// Finds a keypair by name.
    fn keypair_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Keypair>>;

    /// Registers a public key under the given keypair name.
    fn create_keypair<'a>(&'a self, name: &'a str, public_key: &'a str)
    -> ApiFuture<'a, Keypair>;

    /// Deletes a keypair by name.
    fn delete_keypair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()>;

    /// Lists floating IPs belonging to the given pool.
    fn floating_ips<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, Vec<FloatingIp>>;

    /// Fetches a floating IP by id.
    fn floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, FloatingIp>;

    /// Allocates a new floating IP from the given pool.
    fn allocate_floating_ip<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, FloatingIp>;

    /// Releases a floating IP back to its pool.
    fn release_floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()>;

    /// Associates a floating IP address with a server.
    fn associate_floating_ip<'a>(
        &'a self,
        server_id: &'a str,
        address: &'a str,
    ) -> ApiFuture<'a, ()>;

    /// Creates a volume and returns the provider's view of it.
    fn create_volume<'a>(&'a self, request: &'a CreateVolume) -> ApiFuture<'a, Volume>;

    /// Fetches a volume by id.
    fn volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Volume>;

    /// Requests deletion of a volume by id.
    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()>;
}

/// Errors raised by compute API implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when a get-by-id or delete targets a resource the provider no
    /// longer lists. Benign in delete and existence paths.
    #[error("{resource} not found")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },
    /// Raised when the provider rejects the auth token (HTTP 401).
    #[error("authorization rejected by the provider")]
    Unauthorized,
    /// Any other non-success response from the provider.
    #[error("provider returned status {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, decoded best-effort.
        message: String,
    },
    /// Raised when the request never reached the provider.
    #[error("transport failure: {message}")]
    Transport {
        /// Error reported by the HTTP client.
        message: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode provider response: {message}")]
    Decode {
        /// Parser error message.
        message: String,
    },
}

impl ApiError {
    /// Whether this error is a benign not-found condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error is an authorization rejection.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
