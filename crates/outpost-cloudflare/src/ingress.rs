//! The ordered ingress-rule state machine.
//!
//! Cloudflare evaluates ingress rules first-match and terminates the list
//! with a mandatory catch-all returning HTTP 404. The remote API only
//! supports replacing the whole list, so every mutation here is
//! read-modify-write: GET the current list, apply the change in memory,
//! normalize, PUT the full list back.
//!
//! A per-reconciler mutex serializes the read-modify-write window. That
//! protects against concurrent mutations from this process only; two agent
//! processes driving the same tunnel can still lose an update, and the API
//! offers no conditional-update primitive to close that gap. Multi-process
//! deployments are unsupported.

use std::sync::Arc;

use outpost_state::{IngressRule, LocalStateStore, StateError};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{ApiError, CloudflareApi};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("a route for {0} already exists in the tunnel ingress")]
    DuplicateRoute(String),

    #[error("an ingress route requires a hostname")]
    MissingHostname,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Applies minimal add/remove mutations to the remote ingress list while
/// preserving the trailing catch-all.
pub struct IngressReconciler {
    api: Arc<dyn CloudflareApi>,
    account_id: String,
    tunnel_id: String,
    /// Serializes the GET/mutate/PUT window.
    write_lock: Mutex<()>,
}

impl IngressReconciler {
    pub fn new(
        api: Arc<dyn CloudflareApi>,
        account_id: impl Into<String>,
        tunnel_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            account_id: account_id.into(),
            tunnel_id: tunnel_id.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The current remote rule list, with the catch-all restored if the
    /// tunnel has never been routed. Never empty.
    async fn fetch_routes(&self) -> Result<Vec<IngressRule>, ApiError> {
        let rules = self
            .api
            .get_ingress(&self.account_id, &self.tunnel_id)
            .await?;
        if rules.is_empty() {
            return Ok(vec![IngressRule::catch_all()]);
        }
        Ok(rules)
    }

    /// Read-only view of the remote ingress list.
    pub async fn routes(&self) -> Result<Vec<IngressRule>, ApiError> {
        self.fetch_routes().await
    }

    /// Insert a new rule at the head of the remote list.
    ///
    /// Head insertion is deliberate: ingress matching is first-match, so the
    /// most recently added route wins any hostname ambiguity. Inserting a
    /// hostname that is already routed is rejected, since the caller's desired
    /// state has diverged from what it believes.
    ///
    /// The local cached copy is updated only after the remote PUT succeeds.
    pub async fn add_route(
        &self,
        store: &mut LocalStateStore,
        rule: IngressRule,
    ) -> Result<(), IngressError> {
        let hostname = rule.hostname.clone().ok_or(IngressError::MissingHostname)?;
        let _guard = self.write_lock.lock().await;

        let current = self.fetch_routes().await?;
        if current
            .iter()
            .any(|r| r.hostname.as_deref() == Some(hostname.as_str()))
        {
            return Err(IngressError::DuplicateRoute(hostname));
        }

        let rules = normalize(current, |rules| rules.insert(0, rule));
        self.api
            .put_ingress(&self.account_id, &self.tunnel_id, &rules)
            .await?;
        tracing::info!("ingress route added for {}", hostname);

        store.set_ingress(rules);
        store.save()?;
        Ok(())
    }

    /// Remove every rule matching `hostname` (duplicates included). Removing
    /// a hostname that is not routed is a success no-op; the PUT still runs
    /// and re-normalizes the list.
    pub async fn remove_route(
        &self,
        store: &mut LocalStateStore,
        hostname: &str,
    ) -> Result<(), IngressError> {
        let _guard = self.write_lock.lock().await;

        let current = self.fetch_routes().await?;
        let rules = normalize(current, |rules| {
            rules.retain(|r| r.hostname.as_deref() != Some(hostname));
        });
        self.api
            .put_ingress(&self.account_id, &self.tunnel_id, &rules)
            .await?;
        tracing::info!("ingress route removed for {}", hostname);

        store.set_ingress(rules);
        store.save()?;
        Ok(())
    }
}

/// Apply `mutate` to the real rules and re-append exactly one catch-all.
///
/// Any catch-alls already in the list are stripped first, so a list damaged
/// by an earlier buggy mutation (missing or duplicated catch-all) comes out
/// healed.
fn normalize(
    current: Vec<IngressRule>,
    mutate: impl FnOnce(&mut Vec<IngressRule>),
) -> Vec<IngressRule> {
    let mut rules: Vec<IngressRule> = current.into_iter().filter(|r| !r.is_catch_all()).collect();
    mutate(&mut rules);
    rules.push(IngressRule::catch_all());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(hostname: &str) -> IngressRule {
        IngressRule::new(hostname, "http://10.0.0.5:8080")
    }

    #[test]
    fn normalize_restores_missing_catch_all() {
        let rules = normalize(vec![rule("a.example.com")], |_| {});
        assert_eq!(rules.len(), 2);
        assert!(rules.last().unwrap().is_catch_all());
    }

    #[test]
    fn normalize_collapses_duplicate_catch_alls() {
        let damaged = vec![
            rule("a.example.com"),
            IngressRule::catch_all(),
            IngressRule::catch_all(),
        ];
        let rules = normalize(damaged, |_| {});
        assert_eq!(rules.iter().filter(|r| r.is_catch_all()).count(), 1);
        assert!(rules.last().unwrap().is_catch_all());
    }

    #[test]
    fn normalize_head_insert() {
        let current = vec![rule("a.example.com"), IngressRule::catch_all()];
        let rules = normalize(current, |rules| rules.insert(0, rule("b.example.com")));
        let hostnames: Vec<_> = rules.iter().filter_map(|r| r.hostname.as_deref()).collect();
        assert_eq!(hostnames, ["b.example.com", "a.example.com"]);
        assert!(rules.last().unwrap().is_catch_all());
    }

    #[test]
    fn normalize_removes_all_duplicates() {
        let current = vec![
            rule("a.example.com"),
            rule("a.example.com"),
            rule("b.example.com"),
            IngressRule::catch_all(),
        ];
        let rules = normalize(current, |rules| {
            rules.retain(|r| r.hostname.as_deref() != Some("a.example.com"));
        });
        let hostnames: Vec<_> = rules.iter().filter_map(|r| r.hostname.as_deref()).collect();
        assert_eq!(hostnames, ["b.example.com"]);
    }
}
