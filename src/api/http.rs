//! HTTP implementation of the compute API client.
//!
//! Endpoints follow the compute service's REST conventions: resource
//! collections under the versioned tenant URL, keypairs, floating IPs, and
//! volumes under their `os-` extension paths, and server actions posted to
//! `servers/{id}/action`. Every request authenticates with a pre-issued
//! token in the `X-Auth-Token` header.

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{
    BlockDeviceMapping, CreateServer, CreateVolume, Flavor, FloatingIp, Image, Keypair, Network,
    Server, Volume,
};
use super::{ApiError, ApiFuture, ComputeApi};
use crate::config::OpenStackConfig;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Typed HTTP client for the compute API.
#[derive(Clone, Debug)]
pub struct HttpComputeApi {
    base_url: String,
    token: String,
}

impl HttpComputeApi {
    /// Creates a client from provider configuration.
    #[must_use]
    pub fn new(config: &OpenStackConfig) -> Self {
        Self {
            base_url: config.compute_url.trim_end_matches('/').to_owned(),
            token: config.auth_token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn read_body(
        response: reqwest::Response,
        path: &str,
    ) -> Result<Vec<u8>, ApiError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        Err(error_for(status.as_u16(), &body, path))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = HTTP_CLIENT
            .get(self.url(path))
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        let body = Self::read_body(response, path).await?;
        decode(&body)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<T, ApiError> {
        let body = self.post_raw(path, payload).await?;
        decode(&body)
    }

    async fn post_raw<B: Serialize + Sync>(
        &self,
        path: &str,
        payload: &B,
    ) -> Result<Vec<u8>, ApiError> {
        let response = HTTP_CLIENT
            .post(self.url(path))
            .header("X-Auth-Token", &self.token)
            .json(payload)
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        Self::read_body(response, path).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = HTTP_CLIENT
            .delete(self.url(path))
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|err| ApiError::Transport {
                message: err.to_string(),
            })?;

        Self::read_body(response, path).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| ApiError::Decode {
        message: err.to_string(),
    })
}

fn error_for(status: u16, body: &[u8], path: &str) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        404 => ApiError::NotFound {
            resource: path.to_owned(),
        },
        _ => ApiError::Api {
            status,
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

#[derive(serde::Deserialize)]
struct ServersResponse {
    servers: Vec<Server>,
}

#[derive(serde::Deserialize)]
struct ServerResponse {
    server: Server,
}

#[derive(serde::Deserialize)]
struct FlavorsResponse {
    flavors: Vec<Flavor>,
}

#[derive(serde::Deserialize)]
struct ImagesResponse {
    images: Vec<Image>,
}

#[derive(serde::Deserialize)]
struct NetworksResponse {
    networks: Vec<Network>,
}

#[derive(serde::Deserialize)]
struct KeypairEntry {
    keypair: Keypair,
}

#[derive(serde::Deserialize)]
struct KeypairsResponse {
    keypairs: Vec<KeypairEntry>,
}

#[derive(serde::Deserialize)]
struct KeypairResponse {
    keypair: Keypair,
}

#[derive(serde::Deserialize)]
struct FloatingIpsResponse {
    floating_ips: Vec<FloatingIp>,
}

#[derive(serde::Deserialize)]
struct FloatingIpResponse {
    floating_ip: FloatingIp,
}

#[derive(serde::Deserialize)]
struct VolumeResponse {
    volume: Volume,
}

#[derive(Serialize)]
struct SecurityGroupRef {
    name: String,
}

#[derive(Serialize)]
struct NetworkRef {
    uuid: String,
}

#[derive(Serialize)]
struct ServerPayload {
    name: String,
    #[serde(rename = "flavorRef")]
    flavor_ref: String,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    image_ref: Option<String>,
    key_name: String,
    security_groups: Vec<SecurityGroupRef>,
    networks: Vec<NetworkRef>,
    availability_zone: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    block_device_mapping_v2: Vec<BlockDeviceMapping>,
    config_drive: bool,
}

#[derive(Serialize)]
struct CreateServerPayload {
    server: ServerPayload,
}

#[derive(Serialize)]
struct AddFloatingIpAction {
    #[serde(rename = "addFloatingIp")]
    add_floating_ip: AddressRef,
}

#[derive(Serialize)]
struct AddressRef {
    address: String,
}

#[derive(Serialize)]
struct AllocateFloatingIpPayload {
    pool: String,
}

#[derive(Serialize)]
struct KeypairPayload {
    keypair: KeypairFields,
}

#[derive(Serialize)]
struct KeypairFields {
    name: String,
    public_key: String,
}

#[derive(Serialize)]
struct VolumePayload {
    volume: VolumeFields,
}

#[derive(Serialize)]
struct VolumeFields {
    display_name: String,
    size: u64,
    #[serde(rename = "imageRef", skip_serializing_if = "Option::is_none")]
    image_ref: Option<String>,
    availability_zone: String,
}

impl ComputeApi for HttpComputeApi {
    fn create_server<'a>(&'a self, request: &'a CreateServer) -> ApiFuture<'a, Server> {
        Box::pin(async move {
            let payload = CreateServerPayload {
                server: ServerPayload {
                    name: request.name.clone(),
                    flavor_ref: request.flavor_id.clone(),
                    image_ref: request.image_id.clone(),
                    key_name: request.key_name.clone(),
                    security_groups: request
                        .security_groups
                        .iter()
                        .map(|name| SecurityGroupRef { name: name.clone() })
                        .collect(),
                    networks: vec![NetworkRef {
                        uuid: request.network_id.clone(),
                    }],
                    availability_zone: request.availability_zone.clone(),
                    block_device_mapping_v2: request.block_devices.clone(),
                    config_drive: request.config_drive,
                },
            };
            let response: ServerResponse = self.post_json("servers", &payload).await?;
            Ok(response.server)
        })
    }

    fn server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Server> {
        Box::pin(async move {
            let response: ServerResponse = self.get_json(&format!("servers/{id}")).await?;
            Ok(response.server)
        })
    }

    fn servers_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Server>> {
        Box::pin(async move {
            // The name query is a regex match server-side; filter exactly.
            let response: ServersResponse = self
                .get_json(&format!("servers/detail?name={name}"))
                .await?;
            Ok(response
                .servers
                .into_iter()
                .filter(|server| server.name == name)
                .collect())
        })
    }

    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("servers/{id}")).await })
    }

    fn flavor_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Flavor>> {
        Box::pin(async move {
            let response: FlavorsResponse = self.get_json("flavors/detail").await?;
            Ok(response
                .flavors
                .into_iter()
                .find(|flavor| flavor.name == name))
        })
    }

    fn image_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Image>> {
        Box::pin(async move {
            let response: ImagesResponse = self.get_json("images/detail").await?;
            Ok(response.images.into_iter().find(|image| image.name == name))
        })
    }

    fn network_labelled<'a>(&'a self, label: &'a str) -> ApiFuture<'a, Option<Network>> {
        Box::pin(async move {
            let response: NetworksResponse = self.get_json("os-networks").await?;
            Ok(response
                .networks
                .into_iter()
                .find(|network| network.label == label))
        })
    }

    fn keypair_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Keypair>> {
        Box::pin(async move {
            let response: KeypairsResponse = self.get_json("os-keypairs").await?;
            Ok(response
                .keypairs
                .into_iter()
                .map(|entry| entry.keypair)
                .find(|keypair| keypair.name == name))
        })
    }

    fn create_keypair<'a>(
        &'a self,
        name: &'a str,
        public_key: &'a str,
    ) -> ApiFuture<'a, Keypair> {
        Box::pin(async move {
            let payload = KeypairPayload {
                keypair: KeypairFields {
                    name: name.to_owned(),
                    public_key: public_key.to_owned(),
                },
            };
            let response: KeypairResponse = self.post_json("os-keypairs", &payload).await?;
            Ok(response.keypair)
        })
    }

    fn delete_keypair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("os-keypairs/{name}")).await })
    }

    fn floating_ips<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, Vec<FloatingIp>> {
        Box::pin(async move {
            let response: FloatingIpsResponse = self.get_json("os-floating-ips").await?;
            Ok(response
                .floating_ips
                .into_iter()
                .filter(|ip| ip.pool == pool)
                .collect())
        })
    }

    fn floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, FloatingIp> {
        Box::pin(async move {
            let response: FloatingIpResponse =
                self.get_json(&format!("os-floating-ips/{id}")).await?;
            Ok(response.floating_ip)
        })
    }

    fn allocate_floating_ip<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, FloatingIp> {
        Box::pin(async move {
            let payload = AllocateFloatingIpPayload {
                pool: pool.to_owned(),
            };
            let response: FloatingIpResponse =
                self.post_json("os-floating-ips", &payload).await?;
            Ok(response.floating_ip)
        })
    }

    fn release_floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("os-floating-ips/{id}")).await })
    }

    fn associate_floating_ip<'a>(
        &'a self,
        server_id: &'a str,
        address: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = AddFloatingIpAction {
                add_floating_ip: AddressRef {
                    address: address.to_owned(),
                },
            };
            self.post_raw(&format!("servers/{server_id}/action"), &payload)
                .await
                .map(|_| ())
        })
    }

    fn create_volume<'a>(&'a self, request: &'a CreateVolume) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            let payload = VolumePayload {
                volume: VolumeFields {
                    display_name: request.name.clone(),
                    size: request.size_gb,
                    image_ref: request.image_id.clone(),
                    availability_zone: request.availability_zone.clone(),
                },
            };
            let response: VolumeResponse = self.post_json("os-volumes", &payload).await?;
            Ok(response.volume)
        })
    }

    fn volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            let response: VolumeResponse = self.get_json(&format!("os-volumes/{id}")).await?;
            Ok(response.volume)
        })
    }

    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move { self.delete(&format!("os-volumes/{id}")).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::super::types::{Address, Server};
    use super::{decode, error_for};
    use crate::api::ApiError;

    #[test]
    fn error_for_maps_auth_and_not_found() {
        assert!(matches!(error_for(401, b"", "servers"), ApiError::Unauthorized));
        assert!(matches!(
            error_for(404, b"", "servers/x"),
            ApiError::NotFound { .. }
        ));
        assert!(matches!(
            error_for(500, b"boom", "servers"),
            ApiError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn decode_parses_server_envelope() {
        let body = br#"{"server":{"id":"abc","name":"vm","status":"ACTIVE","addresses":{"private":[{"addr":"10.0.0.4","version":4}]}}}"#;
        let parsed: super::ServerResponse = decode(body).unwrap_or_else(|err| {
            panic!("decode failed: {err}");
        });
        let mut addresses = HashMap::new();
        addresses.insert(
            String::from("private"),
            vec![Address {
                addr: String::from("10.0.0.4"),
                version: 4,
            }],
        );
        let expected = Server {
            id: String::from("abc"),
            name: String::from("vm"),
            status: String::from("ACTIVE"),
            addresses,
        };
        assert_eq!(parsed.server, expected);
    }

    #[test]
    fn decode_reports_malformed_bodies() {
        let result: Result<super::ServerResponse, ApiError> = decode(b"not json");
        assert!(matches!(result, Err(ApiError::Decode { .. })));
    }
}
