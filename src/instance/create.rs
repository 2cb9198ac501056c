//! Instance creation: flavor, network, and image resolution followed by a
//! single creation request.

use crate::api::{BlockDeviceMapping, CreateServer};

use super::{Instance, InstanceError};

impl Instance {
    /// Creates the instance.
    ///
    /// The flavor is resolved by name and the private network by label. When
    /// the spec boots from a volume, the request carries a block-device
    /// mapping referencing the boot volume provisioned by
    /// [`Instance::create_dependencies`]; otherwise the image is resolved by
    /// name. Exactly one creation request is issued and the provider-assigned
    /// server id is stored on success.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::FlavorNotFound`],
    /// [`InstanceError::ImageNotFound`], or
    /// [`InstanceError::NetworkNotFound`] when a lookup matches nothing, and
    /// propagates provider failures from the creation request itself.
    pub async fn create(&mut self) -> Result<(), InstanceError> {
        let machine_type = self.spec.require_machine_type()?.to_owned();
        let zone = self.spec.require_zone()?.to_owned();

        let flavor = self
            .cloud
            .api
            .flavor_named(&machine_type)
            .await?
            .ok_or(InstanceError::FlavorNotFound { name: machine_type })?;

        let network_label = self.cloud.config.private_network.clone();
        let network = self
            .cloud
            .api
            .network_labelled(&network_label)
            .await?
            .ok_or(InstanceError::NetworkNotFound {
                label: network_label,
            })?;

        let (image_id, block_devices) = if self.spec.boots_from_volume() {
            let volume = self
                .boot_volume
                .as_ref()
                .ok_or_else(|| InstanceError::Spec(String::from(
                    "boot volume not provisioned; call create_dependencies first",
                )))?;
            let mapping = BlockDeviceMapping {
                boot_index: 0,
                uuid: volume.id.clone(),
                source_type: String::from("volume"),
                destination_type: String::from("volume"),
                volume_size: self.spec.volume_size(),
                delete_on_termination: true,
            };
            (None, vec![mapping])
        } else {
            let image_name = self.spec.require_image()?.to_owned();
            let image = self
                .cloud
                .api
                .image_named(&image_name)
                .await?
                .ok_or(InstanceError::ImageNotFound { name: image_name })?;
            (Some(image.id), Vec::new())
        };

        let request = CreateServer {
            name: self.name.clone(),
            flavor_id: flavor.id,
            image_id,
            key_name: self.key_name.clone(),
            security_groups: vec![self.cloud.config.security_group.clone()],
            network_id: network.id,
            availability_zone: zone,
            block_devices,
            config_drive: self.cloud.config.config_drive,
        };

        let server = self.cloud.api.create_server(&request).await?;
        tracing::info!(instance = %self.name, server_id = %server.id, "instance created");
        self.server_id = Some(server.id);
        Ok(())
    }
}
