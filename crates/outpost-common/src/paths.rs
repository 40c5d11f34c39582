use std::io;
use std::path::{Path, PathBuf};

/// On-disk layout for a single Outpost installation.
///
/// Everything lives under one root directory (default `~/.outpost`):
/// the state document at `state.json` and one directory per exposed
/// application under `apps/`.
#[derive(Debug, Clone)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default layout under the user's home directory.
    pub fn default_root() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".outpost")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted state document.
    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.root.join("apps")
    }

    /// Directory holding one application's sources and record.
    pub fn app_dir(&self, app_name: &str) -> PathBuf {
        self.apps_dir().join(app_name)
    }

    /// Create the root and apps directories if they do not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.apps_dir())
    }

    /// Create (if needed) and return the directory for one application.
    pub fn ensure_app_dir(&self, app_name: &str) -> io::Result<PathBuf> {
        let dir = self.app_dir(app_name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let dirs = AppDirs::new("/tmp/outpost-test");
        assert_eq!(dirs.state_file(), PathBuf::from("/tmp/outpost-test/state.json"));
        assert_eq!(
            dirs.app_dir("myapp"),
            PathBuf::from("/tmp/outpost-test/apps/myapp")
        );
    }

    #[test]
    fn ensure_creates_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::new(tmp.path().join("outpost"));
        dirs.ensure().unwrap();
        assert!(dirs.apps_dir().is_dir());

        let app = dirs.ensure_app_dir("demo").unwrap();
        assert!(app.is_dir());
    }
}
