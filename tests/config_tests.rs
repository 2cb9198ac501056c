//! Unit tests for configuration validation.

use skybench::config::ConfigError;
use skybench::test_support::sample_config;
use skybench::{OpenStackConfig, SshConfig};

fn valid_config() -> OpenStackConfig {
    sample_config("~/.ssh/id_rsa.pub")
}

#[test]
fn config_validation_rejects_missing_token_with_actionable_error() {
    let cfg = OpenStackConfig {
        auth_token: String::new(),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("token is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error}");
    };
    assert!(
        message.contains("OS_AUTH_TOKEN"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("skybench.toml"),
        "error should mention config file: {message}"
    );
}

#[test]
fn config_validation_rejects_blank_compute_url() {
    let cfg = OpenStackConfig {
        compute_url: String::from("   "),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("endpoint is required");
    assert!(matches!(error, ConfigError::MissingField(_)));
}

#[test]
fn config_validation_rejects_zero_volume_size() {
    let cfg = OpenStackConfig {
        volume_size_gb: 0,
        ..valid_config()
    };

    let error = cfg.validate().expect_err("zero volume size is invalid");
    assert!(matches!(error, ConfigError::Invalid(_)));
}

#[test]
fn config_validation_accepts_complete_settings() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn spec_from_config_carries_every_default() {
    let spec = valid_config()
        .as_spec()
        .unwrap_or_else(|err| panic!("as_spec: {err}"));

    assert_eq!(spec.machine_type.as_deref(), Some("m1.small"));
    assert_eq!(spec.zone.as_deref(), Some("nova"));
    assert_eq!(spec.image.as_deref(), Some("ubuntu-14.04"));
    assert!(spec.validate().is_ok());
}

#[test]
fn ssh_config_rejects_blank_identity_file() {
    let cfg = SshConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: String::from("ubuntu"),
        ssh_port: 22,
        ssh_identity_file: Some(String::from("  ")),
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
    };

    let error = cfg.validate().expect_err("blank identity file is invalid");
    assert!(matches!(error, ConfigError::Invalid(_)));
}

#[test]
fn ssh_config_accepts_missing_identity_file() {
    let cfg = SshConfig {
        ssh_bin: String::from("ssh"),
        ssh_user: String::from("ubuntu"),
        ssh_port: 22,
        ssh_identity_file: None,
        ssh_batch_mode: true,
        ssh_strict_host_key_checking: false,
        ssh_known_hosts_file: String::from("/dev/null"),
    };

    assert!(cfg.validate().is_ok());
}
