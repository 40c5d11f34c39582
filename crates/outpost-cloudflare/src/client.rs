//! reqwest-backed implementation of [`CloudflareApi`].
//!
//! Every response is parsed as the Cloudflare envelope
//! `{success, result, errors}`; a non-`success` envelope is an error
//! regardless of HTTP status. GETs are retried once on transport failure;
//! mutating requests are never retried automatically, since a retry after an
//! ambiguous failure could duplicate a tunnel or an ingress rule.

use std::time::Duration;

use async_trait::async_trait;
use outpost_state::IngressRule;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::api::{
    AccountInfo, ApiError, CloudflareApi, DnsRecord, DnsRecordSpec, ErrorDetail, TunnelInfo,
    ZoneInfo,
};

const API_BASE: &str = "https://api.cloudflare.com/client/v4";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Low-level Cloudflare API client with bearer-token auth.
pub struct ApiClient {
    http: Client,
    api_token: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ConfigResult {
    #[serde(default)]
    config: Option<ConfigBody>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigBody {
    #[serde(default)]
    ingress: Vec<IngressRule>,
}

#[derive(Debug, Serialize)]
struct PutConfigBody {
    config: ConfigBody,
}

#[derive(Debug, Serialize)]
struct CreateTunnelBody<'a> {
    name: &'a str,
    /// Remotely-managed configuration; required so that ingress mutations
    /// through the configurations endpoint take effect.
    config_src: &'a str,
}

impl ApiClient {
    pub fn new(api_token: impl Into<String>) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            api_token: api_token.into(),
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%method, %url, "cloudflare request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(&self.api_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let envelope: Envelope<T> = request.send().await?.json().await?;
        if !envelope.success {
            return Err(ApiError::Api(envelope.errors));
        }
        Ok(envelope.result)
    }

    /// GET with a single retry on transport failure. Safe because GETs are
    /// idempotent; mutating verbs never go through this path.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        match self.send(Method::GET, path, None::<&()>).await {
            Err(ApiError::Request(e)) => {
                tracing::debug!("GET {} failed ({}), retrying once", path, e);
                self.send(Method::GET, path, None::<&()>).await
            }
            other => other,
        }
    }

    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get(path).await?.ok_or(ApiError::MissingResult)
    }
}

#[async_trait]
impl CloudflareApi for ApiClient {
    async fn list_accounts(&self) -> Result<Vec<AccountInfo>, ApiError> {
        self.get_required("/accounts").await
    }

    async fn list_zones(&self) -> Result<Vec<ZoneInfo>, ApiError> {
        self.get_required("/zones").await
    }

    async fn list_tunnels(&self, account_id: &str) -> Result<Vec<TunnelInfo>, ApiError> {
        self.get_required(&format!("/accounts/{account_id}/cfd_tunnel"))
            .await
    }

    async fn create_tunnel(&self, account_id: &str, name: &str) -> Result<TunnelInfo, ApiError> {
        let body = CreateTunnelBody {
            name,
            config_src: "cloudflare",
        };
        self.send(
            Method::POST,
            &format!("/accounts/{account_id}/cfd_tunnel"),
            Some(&body),
        )
        .await?
        .ok_or(ApiError::MissingResult)
    }

    async fn delete_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<(), ApiError> {
        self.send::<serde_json::Value, ()>(
            Method::DELETE,
            &format!("/accounts/{account_id}/cfd_tunnel/{tunnel_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn get_tunnel(&self, account_id: &str, tunnel_id: &str) -> Result<TunnelInfo, ApiError> {
        self.get_required(&format!("/accounts/{account_id}/cfd_tunnel/{tunnel_id}"))
            .await
    }

    async fn get_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
    ) -> Result<Vec<IngressRule>, ApiError> {
        // A tunnel whose configuration has never been written reports a null
        // config; surface that as an empty list.
        let result: Option<ConfigResult> = self
            .get(&format!(
                "/accounts/{account_id}/cfd_tunnel/{tunnel_id}/configurations"
            ))
            .await?;
        Ok(result
            .and_then(|r| r.config)
            .map(|c| c.ingress)
            .unwrap_or_default())
    }

    async fn put_ingress(
        &self,
        account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError> {
        let body = PutConfigBody {
            config: ConfigBody {
                ingress: rules.to_vec(),
            },
        };
        self.send::<serde_json::Value, _>(
            Method::PUT,
            &format!("/accounts/{account_id}/cfd_tunnel/{tunnel_id}/configurations"),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn list_dns_records(&self, zone_id: &str) -> Result<Vec<DnsRecord>, ApiError> {
        self.get_required(&format!("/zones/{zone_id}/dns_records"))
            .await
    }

    async fn create_dns_record(
        &self,
        zone_id: &str,
        spec: &DnsRecordSpec,
    ) -> Result<DnsRecord, ApiError> {
        self.send(
            Method::POST,
            &format!("/zones/{zone_id}/dns_records"),
            Some(spec),
        )
        .await?
        .ok_or(ApiError::MissingResult)
    }

    async fn delete_dns_record(&self, zone_id: &str, record_id: &str) -> Result<(), ApiError> {
        self.send::<serde_json::Value, ()>(
            Method::DELETE,
            &format!("/zones/{zone_id}/dns_records/{record_id}"),
            None,
        )
        .await?;
        Ok(())
    }
}
