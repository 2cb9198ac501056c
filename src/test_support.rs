//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeComputeApi`] is an in-memory provider double with deterministic
//! identifiers, per-resource reveal delays to exercise polling loops, and
//! counters for asserting how often expensive calls were made.
//! [`ScriptedRunner`] returns pre-seeded command outputs in FIFO order so
//! remote execution can be driven without spawning processes.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::sleep;

use crate::api::{
    Address, ApiError, ApiFuture, ComputeApi, CreateServer, CreateVolume, Flavor, FloatingIp,
    Image, Keypair, Network, Server, Volume,
};
use crate::config::OpenStackConfig;
use crate::exec::{CommandOutput, CommandRunner, ExecError};
use crate::instance::Polling;
use crate::retry::RetryPolicy;

/// Simulated API latency inserted before each fake call so concurrent
/// callers interleave at an await point, as they would against a real
/// provider.
const FAKE_LATENCY: Duration = Duration::from_millis(1);

/// Polling cadence suitable for tests: millisecond intervals, small budgets.
#[must_use]
pub fn fast_polling() -> Polling {
    let fast = RetryPolicy::new(10, Duration::from_millis(1));
    Polling {
        address: fast,
        association: fast,
        deletion: fast,
        release: fast,
        volume: fast,
        auth: RetryPolicy::new(3, Duration::from_millis(1)),
        boot: RetryPolicy::new(5, Duration::from_millis(1)).quiet(),
        boot_initial_delay: Duration::from_millis(1),
    }
}

/// Provider configuration pointing at nothing real, with a fixed run id so
/// generated resource names are predictable.
#[must_use]
pub fn sample_config(public_key_path: &str) -> OpenStackConfig {
    OpenStackConfig {
        compute_url: String::from("http://compute.invalid/v2"),
        auth_token: String::from("token"),
        default_machine_type: String::from("m1.small"),
        default_zone: String::from("nova"),
        default_image: String::from("ubuntu-14.04"),
        public_network: String::from("public"),
        private_network: String::from("private"),
        security_group: String::from("skybench"),
        config_drive: false,
        boot_from_volume: false,
        volume_size_gb: 20,
        public_key_path: public_key_path.to_owned(),
        run_id: Some(String::from("testrun")),
    }
}

struct FakeServer {
    server: Server,
    internal_ip: String,
    network_label: String,
    polls: u32,
}

struct FakeVolume {
    volume: Volume,
    polls: u32,
}

#[derive(Default)]
struct FakeState {
    flavors: Vec<Flavor>,
    images: Vec<Image>,
    networks: Vec<Network>,
    servers: Vec<FakeServer>,
    keypairs: Vec<Keypair>,
    floating_ips: Vec<FloatingIp>,
    volumes: Vec<FakeVolume>,
    create_requests: Vec<CreateServer>,
    image_lookups: u32,
    allocated_ips: u32,
    keypair_creates: u32,
    next_id: u32,
    address_delay: u32,
    volume_delay: u32,
}

impl FakeState {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`ComputeApi`] double.
#[derive(Clone, Default)]
pub struct FakeComputeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeComputeApi {
    /// Creates an empty fake.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a flavor.
    pub fn seed_flavor(&self, id: &str, name: &str) {
        self.lock().flavors.push(Flavor {
            id: id.to_owned(),
            name: name.to_owned(),
            vcpus: 1,
            ram_mb: 2048,
        });
    }

    /// Registers an image.
    pub fn seed_image(&self, id: &str, name: &str) {
        self.lock().images.push(Image {
            id: id.to_owned(),
            name: name.to_owned(),
            status: String::from("active"),
        });
    }

    /// Registers a network.
    pub fn seed_network(&self, id: &str, label: &str) {
        self.lock().networks.push(Network {
            id: id.to_owned(),
            label: label.to_owned(),
        });
    }

    /// Registers a keypair as already present on the provider.
    pub fn seed_keypair(&self, name: &str) {
        self.lock().keypairs.push(Keypair {
            name: name.to_owned(),
            public_key: Some(String::from("ssh-rsa AAAA seeded")),
            fingerprint: None,
        });
    }

    /// Registers an unassociated floating IP in the given pool.
    pub fn seed_free_floating_ip(&self, id: &str, ip: &str, pool: &str) {
        self.lock().floating_ips.push(FloatingIp {
            id: id.to_owned(),
            ip: ip.to_owned(),
            pool: pool.to_owned(),
            fixed_ip: None,
            instance_id: None,
        });
    }

    /// Makes servers report no addresses for the first `polls` status
    /// fetches, exercising the address polling loop.
    pub fn set_address_delay(&self, polls: u32) {
        self.lock().address_delay = polls;
    }

    /// Makes volumes report `creating` for the first `polls` status fetches.
    pub fn set_volume_delay(&self, polls: u32) {
        self.lock().volume_delay = polls;
    }

    /// Removes a server out-of-band, as if another process deleted it. Any
    /// floating IP associated with the server is disassociated, as the
    /// provider would on teardown.
    pub fn delete_server_externally(&self, id: &str) {
        let mut state = self.lock();
        state.servers.retain(|entry| entry.server.id != id);
        for ip in state
            .floating_ips
            .iter_mut()
            .filter(|ip| ip.instance_id.as_deref() == Some(id))
        {
            ip.fixed_ip = None;
            ip.instance_id = None;
        }
    }

    /// Marks a floating IP as associated out-of-band, simulating another
    /// process claiming it.
    pub fn associate_externally(&self, ip_id: &str, fixed_ip: &str) {
        let mut state = self.lock();
        if let Some(entry) = state.floating_ips.iter_mut().find(|ip| ip.id == ip_id) {
            entry.fixed_ip = Some(fixed_ip.to_owned());
            entry.instance_id = Some(String::from("external"));
        }
    }

    /// Number of image list calls served.
    #[must_use]
    pub fn image_lookups(&self) -> u32 {
        self.lock().image_lookups
    }

    /// Creation requests received, in order.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateServer> {
        self.lock().create_requests.clone()
    }

    /// Number of floating IPs allocated (pool growth, not reuse).
    #[must_use]
    pub fn allocated_ips(&self) -> u32 {
        self.lock().allocated_ips
    }

    /// Number of keypair create calls served.
    #[must_use]
    pub fn keypair_creates(&self) -> u32 {
        self.lock().keypair_creates
    }

    /// Whether a keypair with this name is registered.
    #[must_use]
    pub fn keypair_exists(&self, name: &str) -> bool {
        self.lock().keypairs.iter().any(|keypair| keypair.name == name)
    }

    /// Whether a floating IP with this id still exists.
    #[must_use]
    pub fn has_floating_ip(&self, id: &str) -> bool {
        self.lock().floating_ips.iter().any(|ip| ip.id == id)
    }

    /// Whether a volume with this id still exists.
    #[must_use]
    pub fn has_volume(&self, id: &str) -> bool {
        self.lock().volumes.iter().any(|volume| volume.volume.id == id)
    }

    fn render_server(entry: &FakeServer, reveal_addresses: bool) -> Server {
        let mut server = entry.server.clone();
        if reveal_addresses {
            server.status = String::from("ACTIVE");
            server.addresses.insert(
                entry.network_label.clone(),
                vec![Address {
                    addr: entry.internal_ip.clone(),
                    version: 4,
                }],
            );
        }
        server
    }
}

impl ComputeApi for FakeComputeApi {
    fn create_server<'a>(&'a self, request: &'a CreateServer) -> ApiFuture<'a, Server> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            state.create_requests.push(request.clone());
            let id = state.next_id();
            let network_label = state
                .networks
                .iter()
                .find(|network| network.id == request.network_id)
                .map_or_else(|| request.network_id.clone(), |network| network.label.clone());
            let server = Server {
                id: format!("srv-{id}"),
                name: request.name.clone(),
                status: String::from("BUILD"),
                addresses: std::collections::HashMap::new(),
            };
            state.servers.push(FakeServer {
                server: server.clone(),
                internal_ip: format!("10.0.0.{}", 10 + id),
                network_label,
                polls: 0,
            });
            Ok(server)
        })
    }

    fn server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Server> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let delay = state.address_delay;
            let entry = state
                .servers
                .iter_mut()
                .find(|entry| entry.server.id == id)
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("server {id}"),
                })?;
            entry.polls += 1;
            let reveal = entry.polls > delay;
            Ok(FakeComputeApi::render_server(entry, reveal))
        })
    }

    fn servers_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Vec<Server>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            Ok(state
                .servers
                .iter()
                .filter(|entry| entry.server.name == name)
                .map(|entry| FakeComputeApi::render_server(entry, true))
                .collect())
        })
    }

    fn delete_server<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let before = state.servers.len();
            state.servers.retain(|entry| entry.server.id != id);
            if state.servers.len() == before {
                return Err(ApiError::NotFound {
                    resource: format!("server {id}"),
                });
            }
            // The provider disassociates floating IPs of a deleted server.
            for ip in state
                .floating_ips
                .iter_mut()
                .filter(|ip| ip.instance_id.as_deref() == Some(id))
            {
                ip.fixed_ip = None;
                ip.instance_id = None;
            }
            Ok(())
        })
    }

    fn flavor_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Flavor>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            Ok(state
                .flavors
                .iter()
                .find(|flavor| flavor.name == name)
                .cloned())
        })
    }

    fn image_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Image>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            state.image_lookups += 1;
            Ok(state.images.iter().find(|image| image.name == name).cloned())
        })
    }

    fn network_labelled<'a>(&'a self, label: &'a str) -> ApiFuture<'a, Option<Network>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            Ok(state
                .networks
                .iter()
                .find(|network| network.label == label)
                .cloned())
        })
    }

    fn keypair_named<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Keypair>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            Ok(state
                .keypairs
                .iter()
                .find(|keypair| keypair.name == name)
                .cloned())
        })
    }

    fn create_keypair<'a>(
        &'a self,
        name: &'a str,
        public_key: &'a str,
    ) -> ApiFuture<'a, Keypair> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            state.keypair_creates += 1;
            let keypair = Keypair {
                name: name.to_owned(),
                public_key: Some(public_key.to_owned()),
                fingerprint: None,
            };
            state.keypairs.push(keypair.clone());
            Ok(keypair)
        })
    }

    fn delete_keypair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let before = state.keypairs.len();
            state.keypairs.retain(|keypair| keypair.name != name);
            if state.keypairs.len() == before {
                return Err(ApiError::NotFound {
                    resource: format!("keypair {name}"),
                });
            }
            Ok(())
        })
    }

    fn floating_ips<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, Vec<FloatingIp>> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            Ok(state
                .floating_ips
                .iter()
                .filter(|ip| ip.pool == pool)
                .cloned()
                .collect())
        })
    }

    fn floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, FloatingIp> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let state = self.lock();
            state
                .floating_ips
                .iter()
                .find(|ip| ip.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("floating ip {id}"),
                })
        })
    }

    fn allocate_floating_ip<'a>(&'a self, pool: &'a str) -> ApiFuture<'a, FloatingIp> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            state.allocated_ips += 1;
            let id = state.next_id();
            let ip = FloatingIp {
                id: format!("fip-{id}"),
                ip: format!("198.51.100.{id}"),
                pool: pool.to_owned(),
                fixed_ip: None,
                instance_id: None,
            };
            state.floating_ips.push(ip.clone());
            Ok(ip)
        })
    }

    fn release_floating_ip<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let before = state.floating_ips.len();
            state.floating_ips.retain(|ip| ip.id != id);
            if state.floating_ips.len() == before {
                return Err(ApiError::NotFound {
                    resource: format!("floating ip {id}"),
                });
            }
            Ok(())
        })
    }

    fn associate_floating_ip<'a>(
        &'a self,
        server_id: &'a str,
        address: &'a str,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let internal_ip = state
                .servers
                .iter()
                .find(|entry| entry.server.id == server_id)
                .map(|entry| entry.internal_ip.clone())
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("server {server_id}"),
                })?;
            let entry = state
                .floating_ips
                .iter_mut()
                .find(|ip| ip.ip == address)
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("floating ip {address}"),
                })?;
            entry.fixed_ip = Some(internal_ip);
            entry.instance_id = Some(server_id.to_owned());
            Ok(())
        })
    }

    fn create_volume<'a>(&'a self, request: &'a CreateVolume) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let id = state.next_id();
            let volume = Volume {
                id: format!("vol-{id}"),
                name: request.name.clone(),
                status: String::from("creating"),
                size: request.size_gb,
            };
            state.volumes.push(FakeVolume {
                volume: volume.clone(),
                polls: 0,
            });
            Ok(volume)
        })
    }

    fn volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, Volume> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let delay = state.volume_delay;
            let entry = state
                .volumes
                .iter_mut()
                .find(|entry| entry.volume.id == id)
                .ok_or_else(|| ApiError::NotFound {
                    resource: format!("volume {id}"),
                })?;
            entry.polls += 1;
            let mut volume = entry.volume.clone();
            if entry.polls > delay {
                volume.status = String::from("available");
            }
            Ok(volume)
        })
    }

    fn delete_volume<'a>(&'a self, id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            sleep(FAKE_LATENCY).await;
            let mut state = self.lock();
            let before = state.volumes.len();
            state.volumes.retain(|entry| entry.volume.id != id);
            if state.volumes.len() == before {
                return Err(ApiError::NotFound {
                    resource: format!("volume {id}"),
                });
            }
            Ok(())
        })
    }
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic remote command outcomes without spawning
/// processes. An empty queue yields a spawn error, which exercises the
/// unreachable-host path of boot polling.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pushes a successful exit status with empty output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, ExecError> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CommandInvocation {
                program: program.to_owned(),
                args: args.to_vec(),
            });
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ExecError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}
