//! In-memory Cloudflare API backend for tests.
//!
//! Tracks tunnels, per-tunnel ingress configurations and DNS records, counts
//! mutating calls for idempotency assertions, and can simulate failures on
//! the mutation paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use outpost_cloudflare::{
    AccountInfo, ApiError, CloudflareApi, DnsRecord, DnsRecordSpec, ErrorDetail, TunnelInfo,
    ZoneInfo,
};
use outpost_state::IngressRule;
use parking_lot::Mutex;

fn simulated(message: &str) -> ApiError {
    ApiError::Api(vec![ErrorDetail {
        code: 1000,
        message: message.to_string(),
        error_chain: None,
    }])
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    tunnels: Vec<TunnelInfo>,
    /// tunnel id -> raw remote rule list; absent until the first PUT, like a
    /// tunnel whose configuration has never been written.
    ingress: HashMap<String, Vec<IngressRule>>,
    dns: Vec<DnsRecord>,
}

impl Inner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Mock Cloudflare backend with one account and one zone.
pub struct MockCloudflare {
    account: AccountInfo,
    zone: ZoneInfo,
    inner: Mutex<Inner>,
    tunnel_creates: AtomicU64,
    dns_creates: AtomicU64,
    ingress_puts: AtomicU64,
    fail_put_ingress: AtomicBool,
    fail_create_dns: AtomicBool,
    fail_delete_dns: AtomicBool,
    no_accounts: AtomicBool,
}

impl MockCloudflare {
    /// Backend with account `acc1` and zone `example.com`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            account: AccountInfo {
                id: "acc1".to_string(),
                name: "Test Account".to_string(),
            },
            zone: ZoneInfo {
                id: "zone1".to_string(),
                name: "example.com".to_string(),
            },
            inner: Mutex::new(Inner::default()),
            tunnel_creates: AtomicU64::new(0),
            dns_creates: AtomicU64::new(0),
            ingress_puts: AtomicU64::new(0),
            fail_put_ingress: AtomicBool::new(false),
            fail_create_dns: AtomicBool::new(false),
            fail_delete_dns: AtomicBool::new(false),
            no_accounts: AtomicBool::new(false),
        })
    }

    // -- test hooks -------------------------------------------------------

    pub fn set_fail_put_ingress(&self, fail: bool) {
        self.fail_put_ingress.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create_dns(&self, fail: bool) {
        self.fail_create_dns.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_delete_dns(&self, fail: bool) {
        self.fail_delete_dns.store(fail, Ordering::SeqCst);
    }

    /// Simulate a token with no linked accounts.
    pub fn set_no_accounts(&self, empty: bool) {
        self.no_accounts.store(empty, Ordering::SeqCst);
    }

    /// Overwrite a tunnel's raw remote rule list, bypassing normalization.
    /// Used to stage damaged or duplicated configurations.
    pub fn seed_ingress(&self, tunnel_id: &str, rules: Vec<IngressRule>) {
        self.inner.lock().ingress.insert(tunnel_id.to_string(), rules);
    }

    // -- assertions -------------------------------------------------------

    pub fn tunnel_create_calls(&self) -> u64 {
        self.tunnel_creates.load(Ordering::SeqCst)
    }

    pub fn dns_create_calls(&self) -> u64 {
        self.dns_creates.load(Ordering::SeqCst)
    }

    pub fn ingress_put_calls(&self) -> u64 {
        self.ingress_puts.load(Ordering::SeqCst)
    }

    /// Current remote rule list for a tunnel (empty if never written).
    pub fn ingress_of(&self, tunnel_id: &str) -> Vec<IngressRule> {
        self.inner
            .lock()
            .ingress
            .get(tunnel_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tunnel_count(&self) -> usize {
        self.inner.lock().tunnels.len()
    }

    /// Names of all DNS records in the zone.
    pub fn dns_names(&self) -> Vec<String> {
        self.inner.lock().dns.iter().map(|r| r.name.clone()).collect()
    }
}

#[async_trait]
impl CloudflareApi for MockCloudflare {
    async fn list_accounts(&self) -> Result<Vec<AccountInfo>, ApiError> {
        if self.no_accounts.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(vec![self.account.clone()])
    }

    async fn list_zones(&self) -> Result<Vec<ZoneInfo>, ApiError> {
        Ok(vec![self.zone.clone()])
    }

    async fn list_tunnels(&self, _account_id: &str) -> Result<Vec<TunnelInfo>, ApiError> {
        Ok(self.inner.lock().tunnels.clone())
    }

    async fn create_tunnel(&self, _account_id: &str, name: &str) -> Result<TunnelInfo, ApiError> {
        self.tunnel_creates.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        let tunnel = TunnelInfo {
            id: inner.next_id("tunnel"),
            name: name.to_string(),
            status: "inactive".to_string(),
        };
        inner.tunnels.push(tunnel.clone());
        Ok(tunnel)
    }

    async fn delete_tunnel(&self, _account_id: &str, tunnel_id: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        let before = inner.tunnels.len();
        inner.tunnels.retain(|t| t.id != tunnel_id);
        if inner.tunnels.len() == before {
            return Err(simulated("tunnel not found"));
        }
        inner.ingress.remove(tunnel_id);
        Ok(())
    }

    async fn get_tunnel(&self, _account_id: &str, tunnel_id: &str) -> Result<TunnelInfo, ApiError> {
        self.inner
            .lock()
            .tunnels
            .iter()
            .find(|t| t.id == tunnel_id)
            .cloned()
            .ok_or_else(|| simulated("tunnel not found"))
    }

    async fn get_ingress(
        &self,
        _account_id: &str,
        tunnel_id: &str,
    ) -> Result<Vec<IngressRule>, ApiError> {
        Ok(self.ingress_of(tunnel_id))
    }

    async fn put_ingress(
        &self,
        _account_id: &str,
        tunnel_id: &str,
        rules: &[IngressRule],
    ) -> Result<(), ApiError> {
        if self.fail_put_ingress.load(Ordering::SeqCst) {
            return Err(simulated("simulated ingress PUT failure"));
        }
        self.ingress_puts.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "MockCloudflare: replaced ingress of {} with {} rules",
            tunnel_id,
            rules.len()
        );
        self.inner
            .lock()
            .ingress
            .insert(tunnel_id.to_string(), rules.to_vec());
        Ok(())
    }

    async fn list_dns_records(&self, _zone_id: &str) -> Result<Vec<DnsRecord>, ApiError> {
        Ok(self.inner.lock().dns.clone())
    }

    async fn create_dns_record(
        &self,
        _zone_id: &str,
        spec: &DnsRecordSpec,
    ) -> Result<DnsRecord, ApiError> {
        if self.fail_create_dns.load(Ordering::SeqCst) {
            return Err(simulated("simulated DNS create failure"));
        }
        self.dns_creates.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        let record = DnsRecord {
            id: inner.next_id("dns"),
            record_type: spec.record_type.clone(),
            name: spec.name.clone(),
            content: spec.content.clone(),
            proxied: spec.proxied,
        };
        inner.dns.push(record.clone());
        tracing::debug!("MockCloudflare: created record {} for {}", record.id, record.name);
        Ok(record)
    }

    async fn delete_dns_record(&self, _zone_id: &str, record_id: &str) -> Result<(), ApiError> {
        if self.fail_delete_dns.load(Ordering::SeqCst) {
            return Err(simulated("simulated DNS delete failure"));
        }
        let mut inner = self.inner.lock();
        let before = inner.dns.len();
        inner.dns.retain(|r| r.id != record_id);
        if inner.dns.len() == before {
            return Err(simulated("record not found"));
        }
        Ok(())
    }
}
