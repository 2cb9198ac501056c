//! Tests for deletion, existence checks, and floating-IP release.

use super::{new_instance, provisioned, test_cloud};

#[tokio::test]
async fn delete_on_never_created_handle_is_a_noop() {
    let tc = test_cloud();
    let mut instance = new_instance(&tc);

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete should be a no-op: {err}"));
}

#[tokio::test]
async fn exists_is_false_after_confirmed_delete() {
    let tc = test_cloud();
    let mut instance = provisioned(&tc).await;

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));

    let exists = instance
        .exists()
        .await
        .unwrap_or_else(|err| panic!("exists: {err}"));
    assert!(!exists);
}

#[tokio::test]
async fn delete_is_idempotent_and_tolerates_missing_server() {
    let tc = test_cloud();
    let mut instance = provisioned(&tc).await;

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("first delete: {err}"));
    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("second delete should tolerate not-found: {err}"));
}

#[tokio::test]
async fn delete_releases_an_unassociated_floating_ip() {
    let tc = test_cloud();
    let mut instance = provisioned(&tc).await;
    let ip_id = instance
        .floating_ip()
        .map(|ip| ip.id.clone())
        .unwrap_or_else(|| panic!("floating ip expected"));

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));

    assert!(
        !tc.fake.has_floating_ip(&ip_id),
        "unassociated floating IP should be released"
    );
}

#[tokio::test]
async fn delete_keeps_a_floating_ip_reclaimed_by_another_instance() {
    let tc = test_cloud();
    let mut instance = provisioned(&tc).await;
    let ip_id = instance
        .floating_ip()
        .map(|ip| ip.id.clone())
        .unwrap_or_else(|| panic!("floating ip expected"));

    // The server deletion disassociates the address; simulate another
    // instance grabbing it before the release check runs.
    let server_id = instance
        .server_id()
        .map(str::to_owned)
        .unwrap_or_else(|| panic!("server id expected"));
    tc.fake
        .delete_server_externally(&server_id);
    tc.fake.associate_externally(&ip_id, "10.0.0.99");

    instance
        .delete()
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));

    assert!(
        tc.fake.has_floating_ip(&ip_id),
        "reclaimed floating IP must not be released"
    );
}
