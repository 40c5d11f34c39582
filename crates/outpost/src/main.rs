use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use outpost::config::AgentConfig;
use outpost::docker::DockerCli;
use outpost::workflow::{self, ExposeRequest};
use outpost_cloudflare::{ApiClient, CloudflareApi};
use outpost_common::NotInitialized;
use outpost_state::LocalStateStore;

/// Expose locally-built apps through a Cloudflare Tunnel
#[derive(Parser, Debug)]
#[command(name = "outpost")]
#[command(about = "Pull an app from GitHub, run it in a container, publish it through a Cloudflare Tunnel")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "outpost.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link this machine to a Cloudflare account, zone and tunnel
    Init {
        /// DNS zone the exposed apps will live under
        #[arg(long)]
        zone: String,

        /// Cloudflare API token; falls back to OUTPOST_CLOUDFLARE_API_TOKEN
        #[arg(long)]
        api_token: Option<String>,
    },

    /// Download, build, run and publish an app from a GitHub repository
    Expose {
        /// App name; becomes the subdomain and the container name
        name: String,

        /// GitHub repository page URL
        #[arg(long)]
        repo: String,

        /// Port the app listens on inside the container
        #[arg(long)]
        port: u16,

        /// Branch to download ("default" uses the repository default)
        #[arg(long, default_value = "default")]
        branch: String,

        /// GitHub token for private repos; falls back to OUTPOST_GITHUB_TOKEN
        #[arg(long)]
        github_token: Option<String>,
    },

    /// Unpublish an app and clean up its container
    Remove { name: String },

    /// Show tunnel, route and app status
    Status,

    /// Delete the tunnel (apps must be removed first)
    Teardown,
}

/// API client from the stored account credentials.
fn stored_api(store: &LocalStateStore) -> Result<Arc<dyn CloudflareApi>> {
    let account = store.account().ok_or(NotInitialized)?;
    let client = ApiClient::new(account.api_token.clone())?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("outpost=info".parse()?)
                .add_directive("outpost_cloudflare=info".parse()?)
                .add_directive("outpost_github=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AgentConfig::load_and_resolve(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    let mut store = LocalStateStore::open(config.dirs.state_file())
        .context("Failed to open the state document")?;

    match args.command {
        Command::Init { zone, api_token } => {
            let api_token = api_token
                .or_else(|| std::env::var("OUTPOST_CLOUDFLARE_API_TOKEN").ok())
                .context(
                    "API token required: pass --api-token or set OUTPOST_CLOUDFLARE_API_TOKEN",
                )?;
            let api: Arc<dyn CloudflareApi> = Arc::new(ApiClient::new(api_token.clone())?);
            let outcome = workflow::init(&config, &mut store, api, &api_token, &zone).await?;
            println!("Initialized. Tunnel id: {}", outcome.tunnel_id);
        }

        Command::Expose {
            name,
            repo,
            port,
            branch,
            github_token,
        } => {
            let api = stored_api(&store)?;
            let engine = DockerCli::new(config.docker_bin.clone());
            let request = ExposeRequest {
                name,
                repo_url: repo,
                branch,
                container_port: port,
                github_token: github_token
                    .or_else(|| std::env::var("OUTPOST_GITHUB_TOKEN").ok()),
            };
            let record = workflow::expose(&config, &mut store, api, &engine, request).await?;
            println!("{} exposed at https://{}", record.name, record.hostname);
        }

        Command::Remove { name } => {
            let api = stored_api(&store)?;
            let engine = DockerCli::new(config.docker_bin.clone());
            workflow::remove(&config, &mut store, api, &engine, &name).await?;
            println!("{} removed", name);
        }

        Command::Status => {
            let report = if store.is_ready() {
                let api = stored_api(&store)?;
                workflow::status(&config, &store, api).await?
            } else {
                workflow::StatusReport {
                    ready: false,
                    tunnel: None,
                    routes: Vec::new(),
                    apps: outpost::apps::list_apps(&config.dirs)?,
                }
            };

            if !report.ready {
                println!("Not initialized. Run `outpost init` first.");
            }
            if let Some(tunnel) = report.tunnel {
                println!("Tunnel {} ({}): {}", tunnel.name, tunnel.id, tunnel.status);
            }
            if !report.routes.is_empty() {
                println!("Routes:");
                for rule in report.routes {
                    match rule.hostname {
                        Some(hostname) => println!("  {} -> {}", hostname, rule.service),
                        None => println!("  <catch-all> -> {}", rule.service),
                    }
                }
            }
            if !report.apps.is_empty() {
                println!("Apps: {}", report.apps.join(", "));
            }
        }

        Command::Teardown => {
            let api = stored_api(&store)?;
            let deleted = workflow::teardown(&config, &mut store, api).await?;
            println!("Tunnel {} deleted", deleted);
        }
    }

    Ok(())
}
