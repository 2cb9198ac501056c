//! Behavioural test walking one instance through its full lifecycle via the
//! public API: dependencies → create → network → boot → teardown.

use std::sync::Arc;

use skybench::test_support::{FakeComputeApi, ScriptedRunner, fast_polling, sample_config};
use skybench::{MachineSpec, OpenStackCloud, SshConfig, SshExecutor};
use tempfile::TempDir;

fn write_public_key(dir: &TempDir) -> String {
    let key_path = dir.path().join("id_rsa.pub");
    std::fs::write(&key_path, "ssh-rsa AAAATEST bench@host\n")
        .unwrap_or_else(|err| panic!("write key: {err}"));
    key_path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8"))
        .to_owned()
}

fn ssh_executor(runner: ScriptedRunner) -> SshExecutor<ScriptedRunner> {
    let config = SshConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: String::from("ubuntu"),
        ssh_port: 22,
        ssh_identity_file: None,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
    };
    SshExecutor::new(config, runner).unwrap_or_else(|err| panic!("executor: {err}"))
}

#[tokio::test]
async fn full_lifecycle_walks_every_state() {
    let fake = FakeComputeApi::new();
    fake.seed_flavor("flavor-1", "m1.small");
    fake.seed_image("image-1", "ubuntu-14.04");
    fake.seed_network("net-1", "private");

    let keydir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let key_path = write_public_key(&keydir);
    let cloud = OpenStackCloud::with_api(Arc::new(fake.clone()), sample_config(&key_path))
        .with_polling(fast_polling());

    let mut spec = MachineSpec::builder().build();
    spec.apply_defaults(cloud.config());
    let mut instance = cloud
        .instance(spec)
        .unwrap_or_else(|err| panic!("instance: {err}"));

    // Unprovisioned: not listed yet, deletion is a no-op.
    assert!(
        !instance
            .exists()
            .await
            .unwrap_or_else(|err| panic!("exists: {err}"))
    );
    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("early delete: {err}"));

    instance
        .create_dependencies()
        .await
        .unwrap_or_else(|err| panic!("create_dependencies: {err}"));
    assert!(fake.keypair_exists(instance.key_name()));

    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    assert!(
        instance
            .exists()
            .await
            .unwrap_or_else(|err| panic!("exists: {err}"))
    );

    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create: {err}"));
    assert!(instance.public_ip().is_some());
    assert!(instance.internal_ip().is_some());

    let runner = ScriptedRunner::new();
    runner.push_output(Some(0), "bench-host\n", "");
    let executor = ssh_executor(runner);
    instance
        .wait_for_boot_completion(&executor)
        .await
        .unwrap_or_else(|err| panic!("boot: {err}"));
    assert_eq!(instance.hostname(), Some("bench-host"));
    assert!(instance.bootable_at().is_some());

    let held_ip = instance
        .floating_ip()
        .map(|ip| ip.id.clone())
        .unwrap_or_else(|| panic!("floating ip expected"));

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    instance
        .delete_dependencies()
        .await
        .unwrap_or_else(|err| panic!("delete_dependencies: {err}"));

    assert!(
        !instance
            .exists()
            .await
            .unwrap_or_else(|err| panic!("exists after delete: {err}"))
    );
    assert!(!fake.keypair_exists(instance.key_name()));
    assert!(
        !fake.has_floating_ip(&held_ip),
        "floating IP should return to the pool"
    );
}

#[tokio::test]
async fn boot_from_volume_lifecycle_provisions_and_removes_the_volume() {
    let fake = FakeComputeApi::new();
    fake.seed_flavor("flavor-1", "m1.small");
    fake.seed_image("image-1", "ubuntu-14.04");
    fake.seed_network("net-1", "private");
    fake.set_volume_delay(2);

    let keydir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let key_path = write_public_key(&keydir);
    let mut config = sample_config(&key_path);
    config.boot_from_volume = true;
    let cloud = OpenStackCloud::with_api(Arc::new(fake.clone()), config)
        .with_polling(fast_polling());

    let mut spec = MachineSpec::builder().build();
    spec.apply_defaults(cloud.config());
    assert!(spec.boots_from_volume(), "config default should flow into the spec");

    let mut instance = cloud
        .instance(spec)
        .unwrap_or_else(|err| panic!("instance: {err}"));
    instance
        .create_dependencies()
        .await
        .unwrap_or_else(|err| panic!("create_dependencies: {err}"));
    let volume_id = instance
        .boot_volume()
        .map(|volume| volume.id.clone())
        .unwrap_or_else(|| panic!("boot volume expected"));

    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));
    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));
    instance
        .delete_dependencies()
        .await
        .unwrap_or_else(|err| panic!("delete_dependencies: {err}"));

    assert!(!fake.has_volume(&volume_id));
}
