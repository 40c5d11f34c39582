//! Idempotent tunnel lookup-or-create against one account.

use std::sync::Arc;

use outpost_state::{LocalStateStore, StateError};
use thiserror::Error;

use crate::api::{ApiError, CloudflareApi, TunnelInfo};

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Lookup-or-create registry for the installation's single tunnel.
pub struct TunnelRegistry {
    api: Arc<dyn CloudflareApi>,
    account_id: String,
}

impl TunnelRegistry {
    pub fn new(api: Arc<dyn CloudflareApi>, account_id: impl Into<String>) -> Self {
        Self {
            api,
            account_id: account_id.into(),
        }
    }

    /// Return the tunnel named `name`, creating it if it does not exist.
    ///
    /// Lookup-by-name always precedes create, so calling this twice with the
    /// same name never produces a duplicate tunnel.
    pub async fn get_or_create(&self, name: &str) -> Result<TunnelInfo, ApiError> {
        let tunnels = self.api.list_tunnels(&self.account_id).await?;
        if let Some(existing) = tunnels.into_iter().find(|t| t.name == name) {
            tracing::info!("reusing existing tunnel {} ({})", existing.name, existing.id);
            return Ok(existing);
        }

        let created = self.api.create_tunnel(&self.account_id, name).await?;
        tracing::info!("created tunnel {} ({})", created.name, created.id);
        Ok(created)
    }

    /// Delete the remote tunnel and clear the local record. A missing remote
    /// tunnel propagates as an error rather than being silently ignored.
    pub async fn delete(
        &self,
        store: &mut LocalStateStore,
        tunnel_id: &str,
    ) -> Result<String, TunnelError> {
        self.api.delete_tunnel(&self.account_id, tunnel_id).await?;
        store.clear_tunnel();
        store.save()?;
        tracing::info!("deleted tunnel {}", tunnel_id);
        Ok(tunnel_id.to_string())
    }

    /// Read-only passthrough of the remote tunnel status.
    pub async fn status(&self, tunnel_id: &str) -> Result<String, ApiError> {
        let tunnel = self.api.get_tunnel(&self.account_id, tunnel_id).await?;
        Ok(tunnel.status)
    }
}
