//! Account and zone resolution. Pure remote reads, no side effects.

use std::sync::Arc;

use thiserror::Error;

use crate::api::{AccountInfo, ApiError, CloudflareApi, ZoneInfo};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("no accounts are linked to this API token")]
    NoAccountLinked,

    #[error("this account has no DNS zones")]
    NoZonesAvailable,

    #[error("zone {0} does not belong to this account")]
    ZoneNotOwned(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Resolves the account owning an API token and validates zone ownership.
pub struct AccountResolver {
    api: Arc<dyn CloudflareApi>,
}

impl AccountResolver {
    pub fn new(api: Arc<dyn CloudflareApi>) -> Self {
        Self { api }
    }

    /// The account the token belongs to. Tokens scoped to multiple accounts
    /// resolve to the first one; single-account tokens are the assumption.
    pub async fn resolve_account(&self) -> Result<AccountInfo, AccountError> {
        let mut accounts = self.api.list_accounts().await?;
        if accounts.is_empty() {
            return Err(AccountError::NoAccountLinked);
        }
        if accounts.len() > 1 {
            tracing::warn!(
                "API token is linked to {} accounts, using the first",
                accounts.len()
            );
        }
        Ok(accounts.remove(0))
    }

    /// Validate that `zone_name` is one of the zones the token can manage.
    pub async fn resolve_zone(&self, zone_name: &str) -> Result<ZoneInfo, AccountError> {
        let zones = self.api.list_zones().await?;
        if zones.is_empty() {
            return Err(AccountError::NoZonesAvailable);
        }
        zones
            .into_iter()
            .find(|z| z.name == zone_name)
            .ok_or_else(|| AccountError::ZoneNotOwned(zone_name.to_string()))
    }
}
