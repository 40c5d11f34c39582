//! One-time installation bootstrap: account → zone → tunnel → state.

use std::sync::Arc;

use outpost_state::{Account, LocalStateStore, StateDocument, StateError, TunnelState, Zone};
use thiserror::Error;

use crate::account::{AccountError, AccountResolver};
use crate::api::CloudflareApi;
use crate::dns::DnsBinder;
use crate::tunnel::TunnelRegistry;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Api(#[from] crate::api::ApiError),

    #[error(transparent)]
    Dns(#[from] crate::dns::DnsError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Identifiers produced by a successful bootstrap.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub account_id: String,
    pub zone_id: String,
    pub tunnel_id: String,
}

/// Link the installation to a Cloudflare account and its tunnel.
///
/// Resolves the token's account, validates that `zone_name` belongs to it,
/// looks up or creates the tunnel named `tunnel_name`, persists the whole
/// document, then issues the tunnel's own convenience DNS record
/// `<tunnel_name>.<zone_name>`. Re-running with the same inputs converges on
/// the same remote resources; every step is idempotent by lookup.
pub async fn bootstrap(
    api: Arc<dyn CloudflareApi>,
    store: &mut LocalStateStore,
    api_token: &str,
    zone_name: &str,
    tunnel_name: &str,
) -> Result<BootstrapOutcome, BootstrapError> {
    let resolver = AccountResolver::new(api.clone());
    let account = resolver.resolve_account().await?;
    let zone = resolver.resolve_zone(zone_name).await?;
    tracing::info!("bootstrapping against account {} zone {}", account.name, zone.name);

    let registry = TunnelRegistry::new(api.clone(), account.id.clone());
    let tunnel = registry.get_or_create(tunnel_name).await?;

    let document = StateDocument {
        account: Some(Account {
            id: account.id.clone(),
            name: account.name,
            api_token: api_token.to_string(),
        }),
        tunnel: Some(TunnelState {
            id: tunnel.id.clone(),
            name: tunnel.name.clone(),
            zone: Zone {
                id: zone.id.clone(),
                name: zone.name.clone(),
            },
            ingress: Vec::new(),
        }),
        dns_records: store.dns_records().to_vec(),
    };
    store.save_document(document)?;

    let binder = DnsBinder::new(api, zone.id.clone());
    let tunnel_hostname = format!("{}.{}", tunnel.name, zone.name);
    binder.bind(store, &tunnel_hostname, &tunnel.id).await?;

    Ok(BootstrapOutcome {
        account_id: account.id,
        zone_id: zone.id,
        tunnel_id: tunnel.id,
    })
}
