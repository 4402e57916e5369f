//! Key-value storage backends
//!
//! Keys are plain strings namespaced by prefix (`balance/`, `limits/`,
//! `history/`); values are JSON documents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// Persistent string map shared by every ledger store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>>;

    /// Drop every entry under `prefix` in one write; returns how many went
    fn remove_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Read and decode a JSON document
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON document
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw)
}

/// Decode every document under a prefix, skipping unreadable ones
pub fn scan_json<T: DeserializeOwned>(store: &dyn KeyValueStore, prefix: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for (key, raw) in store.scan(prefix)? {
        match serde_json::from_str(&raw) {
            Ok(value) => out.push(value),
            Err(e) => log::warn!("Skipping unreadable record {key}: {e}"),
        }
    }
    Ok(out)
}

fn scan_map(map: &BTreeMap<String, String>, prefix: &str) -> Vec<(String, String)> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn remove_prefix_map(map: &mut BTreeMap<String, String>, prefix: &str) -> usize {
    let before = map.len();
    map.retain(|k, _| !k.starts_with(prefix));
    before - map.len()
}

// ============ Memory ============

/// In-memory store; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(scan_map(&self.entries.read(), prefix))
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        Ok(remove_prefix_map(&mut self.entries.write(), prefix))
    }
}

// ============ JSON File ============

/// Whole map kept in memory and written through to one JSON file
///
/// Every change rewrites the file via a temp file and a rename, so a crash
/// mid-write leaves the previous contents intact. The in-memory map only
/// takes a change once the file write has succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open a store, starting empty if the file is missing or unreadable
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Ignoring corrupt store {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        log::info!("Opened store {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Apply `change` to a copy, persist it, then swap it in
    fn commit<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> T,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        let out = change(&mut next);
        if changed(&out) {
            self.flush(&next)?;
            *entries = next;
        }
        Ok(out)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.commit(
            |entries| {
                entries.insert(key.to_string(), value.to_string());
            },
            |_| true,
        )
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.commit(|entries| entries.remove(key).is_some(), |removed| *removed)?;
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(scan_map(&self.entries.read(), prefix))
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        self.commit(|entries| remove_prefix_map(entries, prefix), |count| *count > 0)
    }
}
