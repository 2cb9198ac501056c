//! Resource types exchanged with the compute API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A machine-type definition (vCPU and memory sizing).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Flavor {
    /// Provider identifier.
    pub id: String,
    /// Human-readable flavor name (for example `m1.small`).
    pub name: String,
    /// Number of virtual CPUs.
    #[serde(default)]
    pub vcpus: u32,
    /// Memory in MB.
    #[serde(default, rename = "ram")]
    pub ram_mb: u64,
}

/// A bootable machine image.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Image {
    /// Provider identifier.
    pub id: String,
    /// Human-readable image name.
    pub name: String,
    /// Lifecycle status reported by the provider.
    #[serde(default)]
    pub status: String,
}

/// A network instances can attach to.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Network {
    /// Provider identifier.
    pub id: String,
    /// Human-readable network label.
    pub label: String,
}

/// A registered SSH keypair.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Keypair {
    /// Keypair name, unique per tenant.
    pub name: String,
    /// Public key material, when the provider returns it.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Key fingerprint, when the provider returns it.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// A pool-managed public IP address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct FloatingIp {
    /// Provider identifier.
    pub id: String,
    /// The public address itself.
    pub ip: String,
    /// Pool the address was drawn from.
    #[serde(default)]
    pub pool: String,
    /// Private address the floating IP currently forwards to, `None` while
    /// unassociated.
    #[serde(default)]
    pub fixed_ip: Option<String>,
    /// Server the floating IP is associated with, if any.
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl FloatingIp {
    /// Whether the address is currently unassociated.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.fixed_ip.is_none()
    }
}

/// One address entry on a server's network attachment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Address {
    /// The address itself.
    pub addr: String,
    /// IP version (4 or 6).
    #[serde(default)]
    pub version: u8,
}

/// The provider's view of a server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Server {
    /// Provider identifier.
    pub id: String,
    /// Server name as submitted at creation.
    pub name: String,
    /// Lifecycle status reported by the provider.
    #[serde(default)]
    pub status: String,
    /// Addresses keyed by network label. Empty until the provider finishes
    /// wiring the instance.
    #[serde(default)]
    pub addresses: HashMap<String, Vec<Address>>,
}

impl Server {
    /// Whether the provider reports at least one address on any network.
    #[must_use]
    pub fn has_addresses(&self) -> bool {
        self.addresses.values().any(|entries| !entries.is_empty())
    }

    /// First address reported on the given network label.
    #[must_use]
    pub fn first_address_on(&self, network: &str) -> Option<&str> {
        self.addresses
            .get(network)
            .and_then(|entries| entries.first())
            .map(|entry| entry.addr.as_str())
    }
}

/// A block storage volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Volume {
    /// Provider identifier.
    pub id: String,
    /// Volume name.
    #[serde(default, rename = "display_name")]
    pub name: String,
    /// Lifecycle status (`creating`, `available`, `error`, ...).
    #[serde(default)]
    pub status: String,
    /// Size in GB.
    #[serde(default)]
    pub size: u64,
}

/// One entry of a block-device mapping used when booting from a volume.
///
/// Field names match the wire format of the compute API's
/// `block_device_mapping_v2` creation parameter.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BlockDeviceMapping {
    /// Position in the boot order; the root device is index zero.
    pub boot_index: i32,
    /// Identifier of the source volume.
    pub uuid: String,
    /// Source resource kind (`volume`).
    pub source_type: String,
    /// Destination resource kind (`volume`).
    pub destination_type: String,
    /// Volume size in GB.
    pub volume_size: u64,
    /// Whether the volume is deleted together with the instance.
    pub delete_on_termination: bool,
}

/// Parameters for an instance-creation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateServer {
    /// Server name.
    pub name: String,
    /// Resolved flavor id.
    pub flavor_id: String,
    /// Resolved image id; `None` when booting from a volume.
    pub image_id: Option<String>,
    /// Keypair registered for SSH access.
    pub key_name: String,
    /// Security groups applied to the instance.
    pub security_groups: Vec<String>,
    /// Network the instance attaches to.
    pub network_id: String,
    /// Availability zone the instance is scheduled into.
    pub availability_zone: String,
    /// Block-device mappings; non-empty only when booting from a volume.
    pub block_devices: Vec<BlockDeviceMapping>,
    /// Whether to expose metadata through a config drive.
    pub config_drive: bool,
}

/// Parameters for a volume-creation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateVolume {
    /// Volume name.
    pub name: String,
    /// Requested size in GB.
    pub size_gb: u64,
    /// Image the volume is populated from, if any.
    pub image_id: Option<String>,
    /// Availability zone the volume is created in.
    pub availability_zone: String,
}
