//! Ingress reconciliation state-machine tests against the mock backend.

use std::sync::Arc;

use outpost_cloudflare::{CloudflareApi, IngressError, IngressReconciler};
use outpost_e2e::MockCloudflare;
use outpost_state::{Account, IngressRule, LocalStateStore, TunnelState, Zone};

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("outpost_cloudflare=debug,outpost_e2e=debug")
        .with_test_writer()
        .try_init();
}

/// Store pre-populated as if bootstrap already ran.
fn ready_store(dir: &tempfile::TempDir) -> LocalStateStore {
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();
    store.set_account(Account {
        id: "acc1".into(),
        name: "Test Account".into(),
        api_token: "token".into(),
    });
    store.set_tunnel(TunnelState {
        id: "tunnel-1".into(),
        name: "outpost-tunnel".into(),
        zone: Zone {
            id: "zone1".into(),
            name: "example.com".into(),
        },
        ingress: Vec::new(),
    });
    store.save().unwrap();
    store
}

fn reconciler(mock: &Arc<MockCloudflare>) -> IngressReconciler {
    IngressReconciler::new(mock.clone() as Arc<dyn CloudflareApi>, "acc1", "tunnel-1")
}

fn hostnames(rules: &[IngressRule]) -> Vec<&str> {
    rules.iter().filter_map(|r| r.hostname.as_deref()).collect()
}

fn catch_all_count(rules: &[IngressRule]) -> usize {
    rules.iter().filter(|r| r.is_catch_all()).count()
}

#[tokio::test]
async fn add_is_head_insert_with_single_catch_all() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);
    let reconciler = reconciler(&mock);

    reconciler
        .add_route(&mut store, IngressRule::new("a.example.com", "http://10.0.0.5:8080"))
        .await
        .unwrap();
    reconciler
        .add_route(&mut store, IngressRule::new("b.example.com", "http://10.0.0.5:8081"))
        .await
        .unwrap();

    let remote = mock.ingress_of("tunnel-1");
    assert_eq!(hostnames(&remote), ["b.example.com", "a.example.com"]);
    assert_eq!(catch_all_count(&remote), 1);
    assert!(remote.last().unwrap().is_catch_all());

    // Local cache mirrors the remote list after each successful PUT.
    assert_eq!(store.tunnel().unwrap().ingress, remote);
}

#[tokio::test]
async fn fresh_tunnel_gets_catch_all_on_first_add() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);

    // No PUT has ever happened for this tunnel: the remote reports no
    // ingress at all.
    assert!(mock.ingress_of("tunnel-1").is_empty());

    reconciler(&mock)
        .add_route(&mut store, IngressRule::new("a.example.com", "http://10.0.0.5:8080"))
        .await
        .unwrap();

    let remote = mock.ingress_of("tunnel-1");
    assert_eq!(remote.len(), 2);
    assert!(remote.last().unwrap().is_catch_all());
}

#[tokio::test]
async fn duplicate_add_is_rejected() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);
    let reconciler = reconciler(&mock);

    let rule = IngressRule::new("a.example.com", "http://10.0.0.5:8080");
    reconciler.add_route(&mut store, rule.clone()).await.unwrap();

    let err = reconciler.add_route(&mut store, rule).await.unwrap_err();
    assert!(matches!(err, IngressError::DuplicateRoute(h) if h == "a.example.com"));

    // The rejected add never reached the remote.
    assert_eq!(mock.ingress_put_calls(), 1);
}

#[tokio::test]
async fn remove_deletes_every_matching_rule() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);

    // Stage a remote list with duplicates, as left behind by a buggy writer.
    mock.seed_ingress(
        "tunnel-1",
        vec![
            IngressRule::new("a.example.com", "http://10.0.0.5:8080"),
            IngressRule::new("a.example.com", "http://10.0.0.5:9999"),
            IngressRule::new("b.example.com", "http://10.0.0.5:8081"),
            IngressRule::catch_all(),
        ],
    );

    reconciler(&mock)
        .remove_route(&mut store, "a.example.com")
        .await
        .unwrap();

    let remote = mock.ingress_of("tunnel-1");
    assert_eq!(hostnames(&remote), ["b.example.com"]);
    assert_eq!(catch_all_count(&remote), 1);
}

#[tokio::test]
async fn remove_of_absent_hostname_is_a_noop_success() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);
    let reconciler = reconciler(&mock);

    reconciler
        .add_route(&mut store, IngressRule::new("a.example.com", "http://10.0.0.5:8080"))
        .await
        .unwrap();
    reconciler
        .remove_route(&mut store, "ghost.example.com")
        .await
        .unwrap();

    let remote = mock.ingress_of("tunnel-1");
    assert_eq!(hostnames(&remote), ["a.example.com"]);
    assert_eq!(catch_all_count(&remote), 1);
}

#[tokio::test]
async fn failed_put_leaves_local_state_untouched() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);

    mock.set_fail_put_ingress(true);
    let err = reconciler(&mock)
        .add_route(&mut store, IngressRule::new("a.example.com", "http://10.0.0.5:8080"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngressError::Api(_)));

    // Neither the in-memory mirror nor the file on disk saw the hostname.
    assert!(store.tunnel().unwrap().ingress.is_empty());
    let reloaded = LocalStateStore::open(store.path().to_path_buf()).unwrap();
    assert!(reloaded.tunnel().unwrap().ingress.is_empty());
}

#[tokio::test]
async fn damaged_catch_all_is_healed_by_any_mutation() {
    init_test();
    let mock = MockCloudflare::new();
    let dir = tempfile::tempdir().unwrap();
    let mut store = ready_store(&dir);

    // Catch-all dropped by an earlier buggy mutation.
    mock.seed_ingress(
        "tunnel-1",
        vec![IngressRule::new("a.example.com", "http://10.0.0.5:8080")],
    );

    reconciler(&mock)
        .remove_route(&mut store, "nothing.example.com")
        .await
        .unwrap();

    let remote = mock.ingress_of("tunnel-1");
    assert_eq!(catch_all_count(&remote), 1);
    assert!(remote.last().unwrap().is_catch_all());
    assert_eq!(hostnames(&remote), ["a.example.com"]);
}
