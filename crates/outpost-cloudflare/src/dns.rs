//! CNAME issuance for exposed hostnames.

use std::sync::Arc;

use outpost_state::{LocalStateStore, StateError};
use thiserror::Error;

use crate::api::{ApiError, CloudflareApi, DnsRecord, DnsRecordSpec};

#[derive(Debug, Error)]
pub enum DnsError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Issues proxied CNAME records pointing hostnames at the tunnel's
/// `<tunnel-id>.cfargotunnel.com` target.
pub struct DnsBinder {
    api: Arc<dyn CloudflareApi>,
    zone_id: String,
}

impl DnsBinder {
    pub fn new(api: Arc<dyn CloudflareApi>, zone_id: impl Into<String>) -> Self {
        Self {
            api,
            zone_id: zone_id.into(),
        }
    }

    /// Create the CNAME for `hostname`, or return the existing record
    /// unchanged if one with the same name is already present (idempotent).
    pub async fn bind(
        &self,
        store: &mut LocalStateStore,
        hostname: &str,
        tunnel_id: &str,
    ) -> Result<DnsRecord, DnsError> {
        let records = self.api.list_dns_records(&self.zone_id).await?;
        let record = match records.into_iter().find(|r| r.name == hostname) {
            Some(existing) => {
                tracing::debug!("DNS record for {} already exists, reusing", hostname);
                existing
            }
            None => {
                let spec = DnsRecordSpec::tunnel_cname(hostname, tunnel_id);
                let created = self.api.create_dns_record(&self.zone_id, &spec).await?;
                tracing::info!("created DNS record {} -> {}", hostname, created.content);
                created
            }
        };

        store.add_dns_record(hostname);
        store.save()?;
        Ok(record)
    }

    /// Best-effort removal of the record for `hostname`. Remote failures are
    /// logged and swallowed so a stale or missing record never blocks a route
    /// removal; the local list is updated regardless.
    pub async fn unbind(&self, store: &mut LocalStateStore, hostname: &str) {
        store.remove_dns_record(hostname);
        if let Err(e) = store.save() {
            tracing::warn!("failed to persist DNS record removal for {}: {}", hostname, e);
        }

        let record = match self.api.list_dns_records(&self.zone_id).await {
            Ok(records) => records.into_iter().find(|r| r.name == hostname),
            Err(e) => {
                tracing::warn!("could not list DNS records while unbinding {}: {}", hostname, e);
                return;
            }
        };

        match record {
            Some(record) => {
                if let Err(e) = self.api.delete_dns_record(&self.zone_id, &record.id).await {
                    tracing::warn!("failed to delete DNS record for {}: {}", hostname, e);
                } else {
                    tracing::info!("deleted DNS record for {}", hostname);
                }
            }
            None => tracing::debug!("no DNS record found for {}, nothing to unbind", hostname),
        }
    }
}
