//! Auxiliary provisioning: keypair registration and boot volumes.

use crate::api::{ApiError, CreateVolume};
use crate::exec::expand_tilde;
use crate::retry::{retry, retry_if};

use super::{Instance, InstanceError};

impl Instance {
    /// Provisions resources the instance needs before creation: the SSH
    /// keypair, and the backing boot volume when booting from a volume.
    ///
    /// # Errors
    ///
    /// Propagates keypair and volume provisioning failures;
    /// [`InstanceError::VolumeUnavailable`] when the boot volume never
    /// reaches the `available` state.
    pub async fn create_dependencies(&mut self) -> Result<(), InstanceError> {
        self.import_keypair().await?;

        if self.spec.boots_from_volume() {
            let image_name = self.spec.require_image()?.to_owned();
            let image = self
                .cloud
                .api
                .image_named(&image_name)
                .await?
                .ok_or(InstanceError::ImageNotFound { name: image_name })?;

            let request = CreateVolume {
                name: format!("{}-boot-volume", self.name),
                size_gb: self.spec.volume_size(),
                image_id: Some(image.id),
                availability_zone: self.spec.require_zone()?.to_owned(),
            };
            let created = self.cloud.api.create_volume(&request).await?;
            tracing::info!(volume = %created.id, "boot volume created");

            let available = retry(self.cloud.polling.volume, "boot volume", || async {
                let current = self.cloud.api.volume(&created.id).await?;
                if current.status == "available" {
                    Ok(current)
                } else {
                    Err(InstanceError::VolumeUnavailable {
                        id: current.id.clone(),
                        status: current.status,
                    })
                }
            })
            .await?;
            self.boot_volume = Some(available);
        }

        Ok(())
    }

    /// Tears down resources provisioned by
    /// [`Instance::create_dependencies`]: the keypair and the boot volume.
    /// Not-found outcomes are benign.
    ///
    /// # Errors
    ///
    /// Propagates provider failures other than not-found.
    pub async fn delete_dependencies(&mut self) -> Result<(), InstanceError> {
        self.delete_keypair().await?;

        if let Some(volume) = self.boot_volume.clone() {
            match self.cloud.api.delete_volume(&volume.id).await {
                Ok(()) => {
                    tracing::info!(volume = %volume.id, "boot volume deleted");
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Registers this handle's keypair with the provider, reading the public
    /// key from the configured path. Registration is idempotent: an existing
    /// keypair of the same name is reused without a create call.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::PublicKey`] when the key file cannot be
    /// read, and propagates provider failures.
    pub async fn import_keypair(&mut self) -> Result<(), InstanceError> {
        if let Some(existing) = self.cloud.api.keypair_named(&self.key_name).await? {
            tracing::debug!(keypair = %existing.name, "keypair already registered");
            self.keypair = Some(existing);
            return Ok(());
        }

        let path = expand_tilde(&self.cloud.config.public_key_path);
        let public_key = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| InstanceError::PublicKey {
                path,
                message: err.to_string(),
            })?;

        let keypair = self
            .cloud
            .api
            .create_keypair(&self.key_name, public_key.trim_end())
            .await?;
        tracing::info!(keypair = %keypair.name, "keypair imported");
        self.keypair = Some(keypair);
        Ok(())
    }

    /// Deletes this handle's keypair. A missing keypair is benign.
    ///
    /// # Errors
    ///
    /// Propagates provider failures other than not-found; authorization
    /// rejections are retried up to the configured budget first.
    pub async fn delete_keypair(&mut self) -> Result<(), InstanceError> {
        let deletion = retry_if(
            self.cloud.polling.auth,
            "keypair deletion",
            ApiError::is_unauthorized,
            || self.cloud.api.delete_keypair(&self.key_name),
        )
        .await;
        match deletion {
            Ok(()) => {
                tracing::debug!(keypair = %self.key_name, "keypair deleted");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(keypair = %self.key_name, "keypair already gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
