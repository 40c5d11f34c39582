//! The multi-step workflows behind each CLI command.
//!
//! Steps run strictly in order and a failure halts the pipeline: a DNS bind
//! that failed must prevent the ingress add, since the hostname would then
//! resolve nowhere useful. Local state only ever reflects steps that
//! completed.

use std::sync::Arc;

use anyhow::Context;
use outpost_cloudflare::{
    bootstrap, BootstrapOutcome, CloudflareApi, DnsBinder, IngressReconciler, TunnelRegistry,
};
use outpost_common::NotInitialized;
use outpost_github::RepoClient;
use outpost_state::{Account, IngressRule, LocalStateStore, TunnelState};

use crate::apps::{self, AppRecord};
use crate::config::ResolvedAgentConfig;
use crate::docker::{self, ContainerEngine};

/// Inputs for exposing one application.
#[derive(Debug, Clone)]
pub struct ExposeRequest {
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    pub container_port: u16,
    pub github_token: Option<String>,
}

/// Snapshot of the installation for `outpost status`.
#[derive(Debug)]
pub struct StatusReport {
    pub ready: bool,
    pub tunnel: Option<TunnelStatus>,
    pub routes: Vec<IngressRule>,
    pub apps: Vec<String>,
}

#[derive(Debug)]
pub struct TunnelStatus {
    pub name: String,
    pub id: String,
    pub status: String,
}

fn require_ready(store: &LocalStateStore) -> anyhow::Result<(Account, TunnelState)> {
    match (store.account(), store.tunnel()) {
        (Some(account), Some(tunnel)) => Ok((account.clone(), tunnel.clone())),
        _ => Err(NotInitialized.into()),
    }
}

/// App names become DNS labels and container names, so the character set is
/// restricted up front.
fn validate_app_name(name: &str) -> anyhow::Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    anyhow::ensure!(
        valid,
        "invalid app name {name:?}: use lowercase letters, digits and dashes"
    );
    Ok(())
}

/// Bootstrap the installation against a Cloudflare account and zone.
pub async fn init(
    config: &ResolvedAgentConfig,
    store: &mut LocalStateStore,
    api: Arc<dyn CloudflareApi>,
    api_token: &str,
    zone_name: &str,
) -> anyhow::Result<BootstrapOutcome> {
    config.dirs.ensure()?;
    let outcome = bootstrap(api, store, api_token, zone_name, &config.tunnel_name)
        .await
        .context("bootstrap failed")?;
    tracing::info!(
        "initialized: account {} zone {} tunnel {}",
        outcome.account_id,
        outcome.zone_id,
        outcome.tunnel_id
    );
    Ok(outcome)
}

/// Download, build, run and publish one application.
pub async fn expose(
    config: &ResolvedAgentConfig,
    store: &mut LocalStateStore,
    api: Arc<dyn CloudflareApi>,
    engine: &dyn ContainerEngine,
    request: ExposeRequest,
) -> anyhow::Result<AppRecord> {
    validate_app_name(&request.name)?;
    let (account, tunnel) = require_ready(store)?;
    let hostname = format!("{}.{}", request.name, tunnel.zone.name);

    // 1. Fetch sources from GitHub.
    let repo = RepoClient::new(request.github_token.as_deref())?;
    let meta = repo.fetch_metadata(&request.repo_url).await?;
    let branch = repo.resolve_branch(&meta, &request.branch).await?;
    let dockerfile_path = repo
        .find_dockerfile(&meta, &branch)
        .await?
        .with_context(|| format!("{} has no Dockerfile", meta.full_name))?;

    let app_dir = config.dirs.ensure_app_dir(&request.name)?;
    let src_dir = app_dir.join("src");
    repo.download(&meta, &branch, &src_dir).await?;

    // 2. Build and run the container.
    let host_port = docker::free_host_port(request.container_port)?;
    engine
        .build_image(&request.name, &src_dir.join(&dockerfile_path), &src_dir)
        .await?;
    engine
        .run_container(&request.name, host_port, request.container_port)
        .await?;

    // 3. DNS first, then ingress; reverse order would route a hostname that
    // does not resolve yet.
    let binder = DnsBinder::new(api.clone(), tunnel.zone.id.clone());
    binder.bind(store, &hostname, &tunnel.id).await?;

    let reconciler = IngressReconciler::new(api, account.id, tunnel.id);
    let service = format!("http://{}:{}", config.service_ip, host_port);
    reconciler
        .add_route(store, IngressRule::new(hostname.clone(), service))
        .await?;

    let record = AppRecord {
        name: request.name,
        repo_url: request.repo_url,
        branch,
        container_port: request.container_port,
        host_port,
        hostname: hostname.clone(),
        dockerfile_path,
    };
    record.save(&config.dirs)?;

    tracing::info!("{} is live at https://{}", record.name, hostname);
    Ok(record)
}

/// Unpublish an application and clean up after it.
///
/// Ingress removal is the safety-critical step and failures there abort;
/// DNS, container and directory cleanup are best-effort.
pub async fn remove(
    config: &ResolvedAgentConfig,
    store: &mut LocalStateStore,
    api: Arc<dyn CloudflareApi>,
    engine: &dyn ContainerEngine,
    name: &str,
) -> anyhow::Result<()> {
    let (account, tunnel) = require_ready(store)?;
    let record = AppRecord::load(&config.dirs, name)?;

    let reconciler = IngressReconciler::new(api.clone(), account.id, tunnel.id);
    reconciler.remove_route(store, &record.hostname).await?;

    let binder = DnsBinder::new(api, tunnel.zone.id);
    binder.unbind(store, &record.hostname).await;

    if let Err(e) = engine.stop_and_remove(name).await {
        tracing::warn!("container cleanup for {} failed: {}", name, e);
    }
    if let Err(e) = std::fs::remove_dir_all(config.dirs.app_dir(name)) {
        tracing::warn!("could not remove app directory for {}: {}", name, e);
    }

    tracing::info!("{} is no longer exposed", name);
    Ok(())
}

/// Collect the installation status. Remote reads only.
pub async fn status(
    config: &ResolvedAgentConfig,
    store: &LocalStateStore,
    api: Arc<dyn CloudflareApi>,
) -> anyhow::Result<StatusReport> {
    let apps = apps::list_apps(&config.dirs)?;
    if !store.is_ready() {
        return Ok(StatusReport {
            ready: false,
            tunnel: None,
            routes: Vec::new(),
            apps,
        });
    }
    let (account, tunnel) = require_ready(store)?;

    let registry = TunnelRegistry::new(api.clone(), account.id.clone());
    let remote_status = registry.status(&tunnel.id).await?;

    let reconciler = IngressReconciler::new(api, account.id, tunnel.id.clone());
    let routes = reconciler.routes().await?;

    Ok(StatusReport {
        ready: true,
        tunnel: Some(TunnelStatus {
            name: tunnel.name,
            id: tunnel.id,
            status: remote_status,
        }),
        routes,
        apps,
    })
}

/// Delete the remote tunnel and forget it locally. Apps must be removed
/// first; their hostnames would otherwise dangle.
pub async fn teardown(
    config: &ResolvedAgentConfig,
    store: &mut LocalStateStore,
    api: Arc<dyn CloudflareApi>,
) -> anyhow::Result<String> {
    let (account, tunnel) = require_ready(store)?;

    let apps = apps::list_apps(&config.dirs)?;
    anyhow::ensure!(
        apps.is_empty(),
        "remove the exposed apps first: {}",
        apps.join(", ")
    );

    let registry = TunnelRegistry::new(api, account.id);
    let deleted = registry.delete(store, &tunnel.id).await?;
    Ok(deleted)
}
