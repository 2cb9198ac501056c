//! Instance teardown and existence checks.

use crate::api::ApiError;
use crate::retry::{retry, retry_if};

use super::{Instance, InstanceError};

impl Instance {
    /// Deletes the instance.
    ///
    /// Deletion of a never-created handle is a no-op. A not-found response
    /// from the provider counts as success. After the deletion request, the
    /// provider is polled until it no longer lists a server of this name;
    /// any floating IP the handle held is then released back to the pool,
    /// re-checking its unassociated status under the floating-IP lock so an
    /// address another handle just claimed is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::ResidualResource`] when the server is still
    /// listed after the polling budget, and propagates other provider
    /// failures.
    pub async fn delete(&mut self) -> Result<(), InstanceError> {
        let Some(server_id) = self.server_id.clone() else {
            tracing::debug!(instance = %self.name, "delete on unprovisioned handle is a no-op");
            return Ok(());
        };
        let polling = self.cloud.polling;

        let deletion = retry_if(
            polling.auth,
            "server deletion",
            ApiError::is_unauthorized,
            || self.cloud.api.delete_server(&server_id),
        )
        .await;
        match deletion {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                tracing::info!(instance = %self.name, "instance already deleted");
            }
            Err(err) => return Err(err.into()),
        }

        retry(polling.deletion, "instance teardown", || async {
            let remaining = self.cloud.api.servers_named(&self.name).await?;
            if remaining.is_empty() {
                Ok(())
            } else {
                Err(InstanceError::ResidualResource {
                    name: self.name.clone(),
                })
            }
        })
        .await?;

        tracing::info!(instance = %self.name, "instance deleted");
        self.release_floating_ip().await
    }

    /// Whether the provider currently lists a server with this handle's
    /// name. A not-found condition reads as "does not exist" rather than an
    /// error.
    ///
    /// # Errors
    ///
    /// Propagates provider failures other than not-found; authorization
    /// rejections are retried up to the configured budget first.
    pub async fn exists(&self) -> Result<bool, InstanceError> {
        let lookup = retry_if(
            self.cloud.polling.auth,
            "existence check",
            ApiError::is_unauthorized,
            || self.cloud.api.servers_named(&self.name),
        )
        .await;
        match lookup {
            Ok(servers) => Ok(!servers.is_empty()),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Releases the floating IP held by this handle when it is no longer
    /// associated with any instance. The unassociated check is performed
    /// once outside the lock to skip addresses that were immediately
    /// reclaimed, then re-checked inside the lock before the release.
    async fn release_floating_ip(&mut self) -> Result<(), InstanceError> {
        let Some(held) = self.floating_ip.clone() else {
            return Ok(());
        };

        let current = match self.cloud.api.floating_ip(&held.id).await {
            Ok(current) => current,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if !current.is_free() {
            tracing::debug!(ip = %held.ip, "floating IP reclaimed by another instance, keeping");
            return Ok(());
        }

        let lock = self.cloud.floating_ip_lock();
        let _guard = lock.lock().await;
        let rechecked = match self.cloud.api.floating_ip(&held.id).await {
            Ok(current) => current,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if !rechecked.is_free() {
            tracing::debug!(ip = %held.ip, "floating IP reclaimed by another instance, keeping");
            return Ok(());
        }

        match self.cloud.api.release_floating_ip(&held.id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        retry(self.cloud.polling.release, "floating IP release", || async {
            match self.cloud.api.floating_ip(&held.id).await {
                Err(err) if err.is_not_found() => Ok(()),
                Ok(_) => Err(InstanceError::Timeout {
                    action: String::from("floating IP release"),
                    name: self.name.clone(),
                }),
                Err(err) => Err(err.into()),
            }
        })
        .await?;

        tracing::info!(ip = %held.ip, "floating IP released");
        Ok(())
    }
}
