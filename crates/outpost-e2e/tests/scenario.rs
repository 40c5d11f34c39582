//! The full expose/remove scenario from bootstrap to an empty ingress.

use std::sync::Arc;

use outpost_cloudflare::{bootstrap, CloudflareApi, DnsBinder, IngressReconciler};
use outpost_e2e::MockCloudflare;
use outpost_state::{IngressRule, LocalStateStore};

fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("outpost_cloudflare=debug,outpost_e2e=debug")
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn expose_then_remove_round_trip() {
    init_test();
    let mock = MockCloudflare::new();
    let api: Arc<dyn CloudflareApi> = mock.clone();
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStateStore::open(dir.path().join("state.json")).unwrap();

    // Bootstrap against zone example.com.
    let outcome = bootstrap(
        api.clone(),
        &mut store,
        "token",
        "example.com",
        "outpost-tunnel",
    )
    .await
    .unwrap();

    let binder = DnsBinder::new(api.clone(), outcome.zone_id.clone());
    let reconciler = IngressReconciler::new(api, outcome.account_id.clone(), outcome.tunnel_id.clone());

    // Expose app1 on local port 8080: DNS first, then ingress.
    let record = binder
        .bind(&mut store, "app1.example.com", &outcome.tunnel_id)
        .await
        .unwrap();
    assert_eq!(record.content, format!("{}.cfargotunnel.com", outcome.tunnel_id));

    reconciler
        .add_route(
            &mut store,
            IngressRule::new("app1.example.com", "http://192.168.1.20:8080"),
        )
        .await
        .unwrap();

    let remote = mock.ingress_of(&outcome.tunnel_id);
    assert_eq!(remote.len(), 2);
    assert_eq!(remote[0].hostname.as_deref(), Some("app1.example.com"));
    assert_eq!(remote[0].service, "http://192.168.1.20:8080");
    assert!(remote[1].is_catch_all());

    // Remove app1. Ingress removal is mandatory; DNS cleanup is attempted
    // but a remote failure there must not fail the removal.
    reconciler
        .remove_route(&mut store, "app1.example.com")
        .await
        .unwrap();
    mock.set_fail_delete_dns(true);
    binder.unbind(&mut store, "app1.example.com").await;

    let remote = mock.ingress_of(&outcome.tunnel_id);
    assert_eq!(remote.len(), 1);
    assert!(remote[0].is_catch_all());

    // The record outlives the failed cleanup attempt remotely, but the
    // local desired state no longer mentions it.
    assert!(mock.dns_names().contains(&"app1.example.com".to_string()));
    assert!(!store
        .dns_records()
        .contains(&"app1.example.com".to_string()));

    // The tunnel's own convenience record from bootstrap is untouched.
    assert!(store
        .dns_records()
        .contains(&"outpost-tunnel.example.com".to_string()));
}
