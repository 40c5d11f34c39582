//! The Outpost ingress reconciliation engine.
//!
//! Everything that talks to Cloudflare lives here: the low-level envelope
//! client ([`client::ApiClient`]), account/zone resolution
//! ([`account::AccountResolver`]), idempotent tunnel lookup-or-create
//! ([`tunnel::TunnelRegistry`]), CNAME issuance ([`dns::DnsBinder`]) and the
//! ordered ingress-rule state machine ([`ingress::IngressReconciler`]).
//!
//! Components operate against the [`api::CloudflareApi`] trait rather than
//! the concrete HTTP client, so the whole engine can be driven by an
//! in-memory mock in tests.

pub mod account;
pub mod api;
pub mod bootstrap;
pub mod client;
pub mod dns;
pub mod ingress;
pub mod tunnel;

pub use account::{AccountError, AccountResolver};
pub use bootstrap::{bootstrap, BootstrapError, BootstrapOutcome};
pub use api::{
    AccountInfo, ApiError, CloudflareApi, DnsRecord, DnsRecordSpec, ErrorDetail, TunnelInfo,
    ZoneInfo,
};
pub use client::ApiClient;
pub use dns::{DnsBinder, DnsError};
pub use ingress::{IngressError, IngressReconciler};
pub use tunnel::{TunnelError, TunnelRegistry};
