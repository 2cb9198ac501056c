//! Tests for networking bring-up and floating-IP allocation.

use super::{new_instance, test_cloud};
use crate::instance::InstanceError;

#[tokio::test]
async fn post_create_before_create_is_rejected() {
    let tc = test_cloud();
    let mut instance = new_instance(&tc);

    let err = instance
        .post_create()
        .await
        .expect_err("post_create requires a created instance");
    assert!(matches!(err, InstanceError::NotCreated { .. }));
}

#[tokio::test]
async fn post_create_records_public_and_internal_addresses() {
    let tc = test_cloud();
    let mut instance = new_instance(&tc);
    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create: {err}"));

    assert!(instance.public_ip().is_some());
    assert!(instance.internal_ip().is_some());
    assert!(instance.floating_ip().is_some());
}

#[tokio::test]
async fn post_create_waits_for_addresses_to_appear() {
    let tc = test_cloud();
    tc.fake.set_address_delay(3);
    let mut instance = new_instance(&tc);
    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create should outlast the delay: {err}"));

    assert!(instance.internal_ip().is_some());
}

#[tokio::test]
async fn post_create_reuses_an_unassociated_floating_ip() {
    let tc = test_cloud();
    tc.fake.seed_free_floating_ip("fip-free", "198.51.100.250", "public");
    let mut instance = new_instance(&tc);
    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create: {err}"));

    assert_eq!(tc.fake.allocated_ips(), 0, "free address should be reused");
    assert_eq!(
        instance.public_ip().map(|ip| ip.to_string()),
        Some(String::from("198.51.100.250"))
    );
}

#[tokio::test]
async fn post_create_allocates_when_pool_has_no_free_address() {
    let tc = test_cloud();
    let mut instance = new_instance(&tc);
    instance
        .create()
        .await
        .unwrap_or_else(|err| panic!("create: {err}"));

    instance
        .post_create()
        .await
        .unwrap_or_else(|err| panic!("post_create: {err}"));

    assert_eq!(tc.fake.allocated_ips(), 1);
}

#[tokio::test]
async fn concurrent_post_create_never_shares_a_floating_ip() {
    let tc = test_cloud();
    tc.fake.seed_free_floating_ip("fip-free", "198.51.100.250", "public");

    let mut first = new_instance(&tc);
    let mut second = new_instance(&tc);
    first
        .create()
        .await
        .unwrap_or_else(|err| panic!("create first: {err}"));
    second
        .create()
        .await
        .unwrap_or_else(|err| panic!("create second: {err}"));

    let (first_result, second_result) = tokio::join!(first.post_create(), second.post_create());
    first_result.unwrap_or_else(|err| panic!("post_create first: {err}"));
    second_result.unwrap_or_else(|err| panic!("post_create second: {err}"));

    let first_ip = first.public_ip().map(|ip| ip.to_string());
    let second_ip = second.public_ip().map(|ip| ip.to_string());
    assert!(first_ip.is_some());
    assert!(second_ip.is_some());
    assert_ne!(first_ip, second_ip, "handles must not share a floating IP");
    assert_eq!(
        tc.fake.allocated_ips(),
        1,
        "one reuse plus one allocation expected"
    );
}
