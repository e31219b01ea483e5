use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use ao_domain::error::Result;
use ao_domain::outcome::OutcomeEntry;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Persistence for rolling KPI windows. An injected capability handle —
/// the in-memory and file-backed implementations in this module are
/// suitable for a single-process deployment; a shared deployment backs
/// this with a real database.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Load every scope's window at startup, keyed by `ScopeKey::as_string()`.
    async fn load_windows(&self) -> Result<Vec<(String, Vec<OutcomeEntry>)>>;
    /// Overwrite one scope's persisted window.
    async fn save_window(&self, scope_key: &str, entries: &[OutcomeEntry]) -> Result<()>;
    /// Flush and release any held resources.
    async fn close(&self) -> Result<()>;
}

/// Process-lifetime store with no persistence. Used in tests and for
/// deployments that accept losing KPI history on restart.
#[derive(Default)]
pub struct InMemoryTelemetryStore {
    windows: RwLock<HashMap<String, Vec<OutcomeEntry>>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn load_windows(&self) -> Result<Vec<(String, Vec<OutcomeEntry>)>> {
        Ok(self
            .windows
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn save_window(&self, scope_key: &str, entries: &[OutcomeEntry]) -> Result<()> {
        self.windows
            .write()
            .insert(scope_key.to_string(), entries.to_vec());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// One JSON file per scope, written via the tmp-file-then-rename pattern
/// so a crash never leaves a torn window on disk.
pub struct FileTelemetryStore {
    dir: PathBuf,
}

impl FileTelemetryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let _ = std::fs::create_dir_all(&dir);
        Self { dir }
    }

    fn path_for(&self, scope_key: &str) -> PathBuf {
        let safe = scope_key.replace([':', '/'], "_");
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl TelemetryStore for FileTelemetryStore {
    async fn load_windows(&self) -> Result<Vec<(String, Vec<OutcomeEntry>)>> {
        let mut windows = Vec::new();
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return Ok(windows);
        };
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let Ok(parsed) = serde_json::from_str::<WindowFile>(&content) else {
                continue;
            };
            windows.push((parsed.scope_key, parsed.entries));
        }
        Ok(windows)
    }

    async fn save_window(&self, scope_key: &str, entries: &[OutcomeEntry]) -> Result<()> {
        let path = self.path_for(scope_key);
        let tmp = path.with_extension("json.tmp");
        let payload = WindowFile {
            scope_key: scope_key.to_string(),
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string(&payload)?;
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
        }
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct WindowFile {
    scope_key: String,
    entries: Vec<OutcomeEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trips_a_window() {
        let store = InMemoryTelemetryStore::new();
        let entries = vec![OutcomeEntry::Success { timestamp_ms: 1, score: 1.0 }];
        store.save_window("global", &entries).await.unwrap();
        let loaded = store.load_windows().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "global");
    }

    #[tokio::test]
    async fn file_store_round_trips_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTelemetryStore::new(dir.path());
        let entries = vec![
            OutcomeEntry::Failed { timestamp_ms: 1 },
            OutcomeEntry::Success { timestamp_ms: 2, score: 0.8 },
        ];
        store.save_window("org:acme", &entries).await.unwrap();

        let reopened = FileTelemetryStore::new(dir.path());
        let loaded = reopened.load_windows().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "org:acme");
        assert_eq!(loaded[0].1.len(), 2);
    }

    #[tokio::test]
    async fn file_store_on_empty_dir_returns_no_windows() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTelemetryStore::new(dir.path());
        assert!(store.load_windows().await.unwrap().is_empty());
    }
}
