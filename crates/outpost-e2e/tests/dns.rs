//! DNS binder idempotence and best-effort cleanup tests.

use std::sync::Arc;

use outpost_cloudflare::{CloudflareApi, DnsBinder, DnsError};
use outpost_e2e::MockCloudflare;
use outpost_state::LocalStateStore;

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("outpost_cloudflare=debug")
        .with_test_writer()
        .try_init();
}

fn binder(mock: &Arc<MockCloudflare>) -> DnsBinder {
    DnsBinder::new(mock.clone() as Arc<dyn CloudflareApi>, "zone1")
}

#[tokio::test]
async fn bind_is_idempotent() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();
    let binder = binder(&mock);

    let first = binder
        .bind(&mut store, "app1.example.com", "tunnel-1")
        .await
        .unwrap();
    let second = binder
        .bind(&mut store, "app1.example.com", "tunnel-1")
        .await
        .unwrap();

    // Second call returned the first record unchanged, no new create.
    assert_eq!(first.id, second.id);
    assert_eq!(mock.dns_create_calls(), 1);
    assert_eq!(first.content, "tunnel-1.cfargotunnel.com");
    assert!(first.proxied);

    assert_eq!(store.dns_records(), ["app1.example.com"]);
}

#[tokio::test]
async fn failed_create_leaves_no_local_record() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();

    mock.set_fail_create_dns(true);
    let err = binder(&mock)
        .bind(&mut store, "app1.example.com", "tunnel-1")
        .await
        .unwrap_err();
    assert!(matches!(err, DnsError::Api(_)));

    assert!(store.dns_records().is_empty());
    assert!(mock.dns_names().is_empty());
}

#[tokio::test]
async fn unbind_swallows_remote_failures() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();
    let binder = binder(&mock);

    binder
        .bind(&mut store, "app1.example.com", "tunnel-1")
        .await
        .unwrap();

    // Remote delete fails; unbind must not propagate, and the local list is
    // still cleaned up.
    mock.set_fail_delete_dns(true);
    binder.unbind(&mut store, "app1.example.com").await;

    assert!(store.dns_records().is_empty());
    assert_eq!(mock.dns_names(), ["app1.example.com"]);
}

#[tokio::test]
async fn unbind_of_unknown_hostname_is_a_noop() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();

    binder(&mock).unbind(&mut store, "ghost.example.com").await;
    assert!(mock.dns_names().is_empty());
}
