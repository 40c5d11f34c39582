//! Typed surface of the Cloudflare REST API consumed by the engine.
//!
//! This trait abstraction allows the engine components to run against a mock
//! backend in tests instead of the real API.

use std::fmt;

use async_trait::async_trait;
use outpost_state::IngressRule;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of the error array in a Cloudflare response envelope. Errors
/// can nest through `error_chain`; display formatting flattens the chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_chain: Option<Vec<ErrorDetail>>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)?;
        if let Some(chain) = &self.error_chain {
            for inner in chain {
                write!(f, " ({})", inner)?;
            }
        }
        Ok(())
    }
}

/// Errors from the remote API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Cloudflare API error: {}", format_errors(.0))]
    Api(Vec<ErrorDetail>),

    #[error("Cloudflare API returned success without a result body")]
    MissingResult,
}

fn format_errors(errors: &[ErrorDetail]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// An account linked to the API token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
}

/// A DNS zone the account controls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneInfo {
    pub id: String,
    pub name: String,
}

/// A remotely-managed tunnel as reported by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// An existing DNS record in the zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
}

/// Body for creating a DNS record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRecordSpec {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
}

impl DnsRecordSpec {
    /// The proxied CNAME pointing `hostname` at a tunnel's edge target.
    pub fn tunnel_cname(hostname: &str, tunnel_id: &str) -> Self {
        Self {
            record_type: "CNAME".to_string(),
            name: hostname.to_string(),
            content: format!("{tunnel_id}.cfargotunnel.com"),
            proxied: true,
        }
    }
}

/// The subset of the Cloudflare v4 API the engine drives.
///
/// `get_ingress` yields the remote ordered rule list as-is; a tunnel whose
/// configuration has never been written yields an empty list. `put_ingress`
/// replaces the whole list; the API has no partial-update primitive.
#[async_trait]
pub trait CloudflareApi: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<AccountInfo>, ApiError>;

    async fn list_zones(&self) -> Result<Vec<ZoneInfo>, ApiError>;

    async fn list_tunnels(&self, account_id: &str) -> Result<Vec<TunnelInfo>, ApiError>;

    async fn create_tunnel(&self, account_id: &str, name: &str) -> Result<TunnelInfo, ApiError>;

    async fn delete_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<(), ApiError>;

    async fn get_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<TunnelInfo, ApiError>;

    async fn get_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<Vec<IngressRule>, ApiError>;

    async fn put_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError>;

    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError>;

    async fn create_dns_record(
        &self,
        zone_id: &str,
        spec: &DnsRecordSpec,
    ) -> Result<DnsRecord, ApiError>;

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_formats_recursively() {
        let detail = ErrorDetail {
            code: 1004,
            message: "DNS validation error".into(),
            error_chain: Some(vec![ErrorDetail {
                code: 9007,
                message: "content is required".into(),
                error_chain: None,
            }]),
        };
        let err = ApiError::Api(vec![detail]);
        let text = err.to_string();
        assert!(text.contains("code 1004: DNS validation error"));
        assert!(text.contains("code 9007: content is required"));
    }

    #[test]
    fn tunnel_cname_spec() {
        let spec = DnsRecordSpec::tunnel_cname("app1.example.com", "t1");
        assert_eq!(spec.record_type, "CNAME");
        assert_eq!(spec.content, "t1.cfargotunnel.com");
        assert!(spec.proxied);
    }
}
