use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::document::{Account, IngressRule, StateDocument, TunnelState};

/// Errors from loading, mutating or persisting the state document.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("state file {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("state document does not match the expected schema: {0}")]
    Schema(serde_json::Error),
}

/// Read-whole / mutate-in-memory / write-whole store for the state document.
///
/// Not safe against two processes writing the same file concurrently; the
/// intended deployment is a single agent process per machine.
#[derive(Debug)]
pub struct LocalStateStore {
    path: PathBuf,
    doc: StateDocument,
}

impl LocalStateStore {
    /// Open the store at `path`. A missing file yields an empty document;
    /// an unreadable or malformed file is an explicit error, never a silent
    /// reset.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let doc = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StateError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("no state file at {}, starting empty", path.display());
                StateDocument::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &StateDocument {
        &self.doc
    }

    /// Bootstrap prerequisite check: account and tunnel both on record.
    pub fn is_ready(&self) -> bool {
        self.doc.is_ready()
    }

    pub fn account(&self) -> Option<&Account> {
        self.doc.account.as_ref()
    }

    pub fn tunnel(&self) -> Option<&TunnelState> {
        self.doc.tunnel.as_ref()
    }

    pub fn set_account(&mut self, account: Account) {
        self.doc.account = Some(account);
    }

    pub fn set_tunnel(&mut self, tunnel: TunnelState) {
        self.doc.tunnel = Some(tunnel);
    }

    /// Forget the active tunnel (after a remote delete). The cached ingress
    /// list goes with it.
    pub fn clear_tunnel(&mut self) {
        self.doc.tunnel = None;
    }

    /// Replace the cached ingress list. No-op if no tunnel is on record.
    pub fn set_ingress(&mut self, rules: Vec<IngressRule>) {
        if let Some(tunnel) = self.doc.tunnel.as_mut() {
            tunnel.ingress = rules;
        }
    }

    pub fn dns_records(&self) -> &[String] {
        &self.doc.dns_records
    }

    pub fn add_dns_record(&mut self, hostname: &str) {
        if !self.doc.dns_records.iter().any(|h| h == hostname) {
            self.doc.dns_records.push(hostname.to_string());
        }
    }

    pub fn remove_dns_record(&mut self, hostname: &str) {
        self.doc.dns_records.retain(|h| h != hostname);
    }

    /// Probe the document by dotted path, e.g. `&["tunnel", "zone", "id"]`.
    /// Returns `None` on any missing segment so callers can cheaply test
    /// partial state.
    pub fn get(&self, path: &[&str]) -> Option<Value> {
        let mut cursor = serde_json::to_value(&self.doc).ok()?;
        for segment in path {
            cursor = cursor.get_mut(segment)?.take();
        }
        Some(cursor)
    }

    /// Set a value by dotted path, creating intermediate objects as needed.
    /// The mutated document is re-validated against the schema, so a write
    /// that would corrupt the document is rejected.
    pub fn set(&mut self, path: &[&str], value: Value) -> Result<(), StateError> {
        let (last, parents) = match path.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };

        let mut root = serde_json::to_value(&self.doc).map_err(StateError::Schema)?;
        let mut cursor = &mut root;
        for segment in parents {
            let map = cursor
                .as_object_mut()
                .ok_or_else(|| io::Error::other(format!("segment {segment} is not an object")))?;
            cursor = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if !cursor.is_object() {
                *cursor = Value::Object(Default::default());
            }
        }
        cursor
            .as_object_mut()
            .ok_or_else(|| io::Error::other("path does not terminate in an object"))?
            .insert(last.to_string(), value);

        self.doc = serde_json::from_value(root).map_err(StateError::Schema)?;
        Ok(())
    }

    /// Persist the in-memory document, creating the parent directory if
    /// needed. Full overwrite.
    pub fn save(&self) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.doc).map_err(StateError::Schema)?;
        std::fs::write(&self.path, raw)?;
        tracing::debug!("state saved to {}", self.path.display());
        Ok(())
    }

    /// Adopt a freshly built document and persist it in one step.
    pub fn save_document(&mut self, doc: StateDocument) -> Result<(), StateError> {
        self.doc = doc;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Zone;

    fn sample_tunnel() -> TunnelState {
        TunnelState {
            id: "t1".into(),
            name: "outpost-tunnel".into(),
            zone: Zone {
                id: "z1".into(),
                name: "example.com".into(),
            },
            ingress: vec![IngressRule::catch_all()],
        }
    }

    #[test]
    fn missing_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStateStore::open(tmp.path().join("state.json")).unwrap();
        assert!(!store.is_ready());
        assert!(store.dns_records().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LocalStateStore::open(&path),
            Err(StateError::Corrupt { .. })
        ));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/state.json");

        let mut store = LocalStateStore::open(&path).unwrap();
        store.set_account(Account {
            id: "acc1".into(),
            name: "me".into(),
            api_token: "tok".into(),
        });
        store.set_tunnel(sample_tunnel());
        store.add_dns_record("app1.example.com");
        store.save().unwrap();

        let reloaded = LocalStateStore::open(&path).unwrap();
        assert!(reloaded.is_ready());
        assert_eq!(reloaded.tunnel().unwrap().id, "t1");
        assert_eq!(reloaded.dns_records(), ["app1.example.com"]);
    }

    #[test]
    fn path_probe_returns_none_on_missing_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = LocalStateStore::open(tmp.path().join("state.json")).unwrap();
        assert_eq!(store.get(&["tunnel", "zone", "id"]), None);

        store.set_tunnel(sample_tunnel());
        assert_eq!(
            store.get(&["tunnel", "zone", "id"]),
            Some(Value::String("z1".into()))
        );
        assert_eq!(store.get(&["tunnel", "nope"]), None);
    }

    #[test]
    fn path_set_is_schema_checked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = LocalStateStore::open(tmp.path().join("state.json")).unwrap();

        // Writing an unknown top-level key must be rejected.
        assert!(store.set(&["bogus"], Value::Bool(true)).is_err());

        // A well-formed nested write lands in the typed document.
        store.set_tunnel(sample_tunnel());
        store
            .set(&["tunnel", "zone", "name"], Value::String("other.com".into()))
            .unwrap();
        assert_eq!(store.tunnel().unwrap().zone.name, "other.com");
    }

    #[test]
    fn dns_records_deduplicate() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = LocalStateStore::open(tmp.path().join("state.json")).unwrap();
        store.add_dns_record("a.example.com");
        store.add_dns_record("a.example.com");
        assert_eq!(store.dns_records().len(), 1);
        store.remove_dns_record("a.example.com");
        assert!(store.dns_records().is_empty());
    }
}
