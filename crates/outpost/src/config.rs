//! Agent configuration with environment variable priority.
//!
//! Configuration is resolved in this order (first found wins):
//! 1. Environment variables (OUTPOST_*)
//! 2. Config file (outpost.toml)
//! 3. Default values (where applicable)

use std::env;
use std::net::UdpSocket;
use std::path::Path;

use outpost_common::AppDirs;
use serde::Deserialize;

/// Environment variable prefix
const ENV_PREFIX: &str = "OUTPOST";

const DEFAULT_TUNNEL_NAME: &str = "outpost-tunnel";
const DEFAULT_DOCKER_BIN: &str = "docker";

/// Agent configuration (parsed from TOML, can be overridden by env)
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Root directory for state and app sources (default `~/.outpost`)
    pub state_dir: Option<String>,

    /// Name of the managed tunnel
    pub tunnel_name: Option<String>,

    /// LAN address containers are reachable on, used in ingress service URLs
    pub service_ip: Option<String>,

    /// Container engine binary to shell out to
    pub docker_bin: Option<String>,
}

/// Resolved agent configuration
#[derive(Debug)]
pub struct ResolvedAgentConfig {
    pub dirs: AppDirs,
    pub tunnel_name: String,
    pub service_ip: String,
    pub docker_bin: String,
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name)).ok()
}

/// Detect the LAN address of this machine by opening a UDP socket towards a
/// public resolver. No packet is sent; the OS just picks the outbound
/// interface, whose address is what the ingress service URL needs.
fn detect_service_ip() -> anyhow::Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("1.1.1.1:80")?;
    let ip = socket.local_addr()?.ip().to_string();
    tracing::info!("detected service IP: {}", ip);
    Ok(ip)
}

impl AgentConfig {
    /// Load configuration from a TOML file (optional)
    pub fn load(path: &str) -> Self {
        if Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path, e);
                }
            }
        }
        Self::default()
    }

    /// Resolve configuration from environment variables first, then config file
    pub fn resolve(self) -> anyhow::Result<ResolvedAgentConfig> {
        // State dir: ENV > config > ~/.outpost
        let dirs = match get_env("STATE_DIR").or(self.state_dir) {
            Some(dir) => AppDirs::new(dir),
            None => AppDirs::default_root().ok_or_else(|| {
                anyhow::anyhow!(
                    "Could not determine a home directory. Set OUTPOST_STATE_DIR or state_dir in config"
                )
            })?,
        };

        let tunnel_name = get_env("TUNNEL_NAME")
            .or(self.tunnel_name)
            .unwrap_or_else(|| DEFAULT_TUNNEL_NAME.to_string());

        // Service IP: ENV > config > auto-detect
        let service_ip = get_env("SERVICE_IP")
            .or(self.service_ip)
            .map(Ok)
            .unwrap_or_else(|| {
                tracing::info!("Service IP not configured, auto-detecting...");
                detect_service_ip()
            })?;

        let docker_bin = get_env("DOCKER_BIN")
            .or(self.docker_bin)
            .unwrap_or_else(|| DEFAULT_DOCKER_BIN.to_string());

        Ok(ResolvedAgentConfig {
            dirs,
            tunnel_name,
            service_ip,
            docker_bin,
        })
    }

    /// Load config file and resolve with environment variable overrides
    pub fn load_and_resolve(path: &str) -> anyhow::Result<ResolvedAgentConfig> {
        let config = Self::load(path);
        config.resolve()
    }
}
