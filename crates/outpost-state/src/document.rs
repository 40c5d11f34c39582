use serde::{Deserialize, Serialize};

/// Service of the mandatory terminal ingress rule.
pub const CATCH_ALL_SERVICE: &str = "http_status:404";

/// The Cloudflare account this installation is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub api_token: String,
}

/// A DNS zone owned by the account, selected once at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

/// One ordered entry of the tunnel's ingress configuration.
///
/// The catch-all rule has no hostname; every real rule carries one. This
/// shape matches the Cloudflare wire format, so the same type is used for
/// the remote configuration body and for the local cached copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub service: String,
}

impl IngressRule {
    /// A real hostname → backend rule.
    pub fn new(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            service: service.into(),
        }
    }

    /// The terminal rule matching everything else with a 404.
    pub fn catch_all() -> Self {
        Self {
            hostname: None,
            service: CATCH_ALL_SERVICE.to_string(),
        }
    }

    pub fn is_catch_all(&self) -> bool {
        self.hostname.is_none()
    }
}

/// The single active tunnel, with the zone it serves and a cached copy of
/// its remote ingress list. The cache is an audit trail only; the remote
/// list is re-fetched before every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelState {
    pub id: String,
    pub name: String,
    pub zone: Zone,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
}

/// The whole persisted document. Strict schema: unknown fields are a load
/// error rather than being silently absorbed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Account>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelState>,
    #[serde(default)]
    pub dns_records: Vec<String>,
}

impl StateDocument {
    /// Bootstrap has completed: both an account and a tunnel are on record.
    /// Route and DNS operations are gated on this.
    pub fn is_ready(&self) -> bool {
        self.account.is_some() && self.tunnel.is_some()
    }
}
