//! Durable string key-value storage
//!
//! The player keeps a handful of small preferences between runs (volume,
//! last position, theme, the failed-source registry). They all live in one
//! flat string map, the way a browser's local storage does.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Well-known storage keys
pub struct StorageKey;

impl StorageKey {
    pub const PLAY_COUNT: &'static str = "audioTrackPlayCounts";
    pub const DATA_MODE: &'static str = "audioPlayerDataMode";
    pub const VOLUME: &'static str = "audioPlayerVolume";
    pub const MUTED: &'static str = "audioPlayerMuted";
    pub const MODE: &'static str = "audioPlayerMode";
    pub const LAST_ORIGINAL_INDEX: &'static str = "audioPlayerOriginalIndex";
    pub const LAST_TIME: &'static str = "audioPlayerTime";
    pub const THEME: &'static str = "userThemePreference";
    /// Owned by the fallback engine's failed-URL registry
    pub const FAILED_URLS: &'static str = "audioFailedUrls";
}

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Volatile store, mostly for tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable one is logged and treated as empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read storage file: {}", path.display()))?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt storage file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened storage {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let raw = serde_json::to_string_pretty(&self.entries)
            .context("Failed to serialize storage")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write storage file: {}", self.path.display()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_file_store_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        assert!(store.get(StorageKey::VOLUME).is_none());
        store.set(StorageKey::VOLUME, "0.8".to_string()).unwrap();
        store.set(StorageKey::THEME, "dark".to_string()).unwrap();
        store.remove(StorageKey::THEME).unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(StorageKey::VOLUME).as_deref(), Some("0.8"));
        assert!(reopened.get(StorageKey::THEME).is_none());
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get(StorageKey::FAILED_URLS).is_none());
    }
}
