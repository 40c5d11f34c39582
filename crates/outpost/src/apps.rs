//! Per-application records, one JSON file per exposed app.

use std::path::PathBuf;

use anyhow::Context;
use outpost_common::AppDirs;
use serde::{Deserialize, Serialize};

/// Everything the agent needs to manage one exposed application. Written at
/// the end of a successful `expose` and read back for `remove` and `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRecord {
    pub name: String,
    pub repo_url: String,
    pub branch: String,
    /// Port the app listens on inside the container.
    pub container_port: u16,
    /// Host port the container publishes; the ingress service URL targets it.
    pub host_port: u16,
    pub hostname: String,
    /// Dockerfile path relative to the repository root.
    pub dockerfile_path: String,
}

fn record_path(dirs: &AppDirs, name: &str) -> PathBuf {
    dirs.app_dir(name).join("app.json")
}

impl AppRecord {
    pub fn load(dirs: &AppDirs, name: &str) -> anyhow::Result<Self> {
        let path = record_path(dirs, name);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("no app named {name} (missing {})", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("app record {} is malformed", path.display()))
    }

    pub fn save(&self, dirs: &AppDirs) -> anyhow::Result<()> {
        dirs.ensure_app_dir(&self.name)?;
        let path = record_path(dirs, &self.name);
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, raw)
            .with_context(|| format!("could not write app record {}", path.display()))
    }
}

/// Names of all apps with a record on disk.
pub fn list_apps(dirs: &AppDirs) -> anyhow::Result<Vec<String>> {
    let apps_dir = dirs.apps_dir();
    if !apps_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(apps_dir)? {
        let entry = entry?;
        if entry.path().join("app.json").is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
