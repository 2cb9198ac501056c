//! Unit tests for the instance lifecycle, driven against the in-memory
//! provider double.

use std::sync::Arc;

use tempfile::TempDir;

use crate::instance::{Instance, OpenStackCloud};
use crate::machine::MachineSpec;
use crate::test_support::{FakeComputeApi, fast_polling, sample_config};

mod network;
mod teardown;

fn seeded_fake() -> FakeComputeApi {
    let fake = FakeComputeApi::new();
    fake.seed_flavor("flavor-1", "m1.small");
    fake.seed_image("image-1", "ubuntu-14.04");
    fake.seed_network("net-1", "private");
    fake
}

struct TestCloud {
    cloud: OpenStackCloud,
    fake: FakeComputeApi,
    _keydir: TempDir,
}

fn test_cloud() -> TestCloud {
    test_cloud_with(seeded_fake())
}

fn test_cloud_with(fake: FakeComputeApi) -> TestCloud {
    let keydir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let key_path = keydir.path().join("id_rsa.pub");
    std::fs::write(&key_path, "ssh-rsa AAAATEST bench@host\n")
        .unwrap_or_else(|err| panic!("write key: {err}"));
    let key_str = key_path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8"))
        .to_owned();
    let cloud = OpenStackCloud::with_api(Arc::new(fake.clone()), sample_config(&key_str))
        .with_polling(fast_polling());
    TestCloud {
        cloud,
        fake,
        _keydir: keydir,
    }
}

fn default_spec(cloud: &OpenStackCloud) -> MachineSpec {
    let mut spec = MachineSpec::builder().build();
    spec.apply_defaults(cloud.config());
    spec
}

fn new_instance(tc: &TestCloud) -> Instance {
    tc.cloud
        .instance(default_spec(&tc.cloud))
        .unwrap_or_else(|err| panic!("instance: {err}"))
}

async fn provisioned(tc: &TestCloud) -> Instance {
    let mut instance = new_instance(tc);
    instance
        .create_dependencies()
        .await
        .unwrap_or_else(|err| panic!("create_dependencies: {err}"));
    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create: {err}"));
    instance
}
