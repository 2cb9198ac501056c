//! Networking bring-up: address polling and floating-IP association.

use std::net::IpAddr;

use crate::api::ApiError;
use crate::retry::retry;

use super::{Instance, InstanceError};

impl Instance {
    /// Brings up the instance's networking.
    ///
    /// Polls until the provider reports at least one address, then claims a
    /// floating IP for the instance: an unassociated address in the
    /// configured pool is reused when one exists, otherwise a new one is
    /// allocated. The find-or-allocate-and-associate sequence, including the
    /// association confirmation poll, runs under the cloud-wide floating-IP
    /// lock so concurrent handles never claim the same address. Public and
    /// internal addresses are recorded on success.
    ///
    /// # Errors
    ///
    /// Returns [`InstanceError::NotCreated`] when called before
    /// [`Instance::create`], [`InstanceError::Timeout`] when polling
    /// budgets are exhausted, and [`InstanceError::MissingAddress`] when the
    /// configured private network carries no address.
    pub async fn post_create(&mut self) -> Result<(), InstanceError> {
        let server_id = self.require_server_id()?;
        let polling = self.cloud.polling;

        let server = retry(polling.address, "network address", || async {
            let current = self.cloud.api.server(&server_id).await?;
            if current.has_addresses() {
                Ok(current)
            } else {
                Err(InstanceError::Timeout {
                    action: String::from("network address"),
                    name: self.name.clone(),
                })
            }
        })
        .await?;

        let pool = self.cloud.config.public_network.clone();
        let lock = self.cloud.floating_ip_lock();
        let floating_ip;
        {
            let _guard = lock.lock().await;
            let free = self
                .cloud
                .api
                .floating_ips(&pool)
                .await?
                .into_iter()
                .find(|ip| ip.is_free());
            floating_ip = match free {
                Some(existing) => {
                    tracing::debug!(ip = %existing.ip, "reusing unassociated floating IP");
                    existing
                }
                None => self.cloud.api.allocate_floating_ip(&pool).await?,
            };

            self.cloud
                .api
                .associate_floating_ip(&server_id, &floating_ip.ip)
                .await?;

            retry(polling.association, "floating IP association", || async {
                let current = self.cloud.api.floating_ip(&floating_ip.id).await?;
                if current.fixed_ip.is_some() {
                    Ok(())
                } else {
                    Err(InstanceError::Timeout {
                        action: String::from("floating IP association"),
                        name: self.name.clone(),
                    })
                }
            })
            .await?;
        }

        let public_ip: IpAddr = floating_ip.ip.parse().map_err(|err| {
            ApiError::Decode {
                message: format!("floating IP address '{}': {err}", floating_ip.ip),
            }
        })?;
        let internal = server
            .first_address_on(&self.cloud.config.private_network)
            .ok_or_else(|| InstanceError::MissingAddress {
                name: self.name.clone(),
                network: self.cloud.config.private_network.clone(),
            })?
            .to_owned();

        tracing::info!(
            instance = %self.name,
            public_ip = %public_ip,
            internal_ip = %internal,
            "instance network ready"
        );
        self.public_ip = Some(public_ip);
        self.internal_ip = Some(internal);
        self.floating_ip = Some(floating_ip);
        Ok(())
    }
}
