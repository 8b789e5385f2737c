//! JSON snapshots of an in-memory store
//!
//! A snapshot file is `{"collections": {"<name>": [<doc>, ...]}}`.
//! Saving writes a sibling temporary file and renames it over the
//! target, so a crash mid-save never leaves a truncated snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{StoreError, StoreResult};
use super::memory::InMemoryStore;

/// Serializable copy of every collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Map<String, Value>>>,
}

impl Snapshot {
    /// Reads a snapshot; a missing file is an empty snapshot.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Io(format!("{}: invalid snapshot: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| StoreError::Io(e.to_string()))?;

        let tmp = temp_path(path);
        fs::write(&tmp, json)
            .map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path)
            .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))
    }

    /// Captures a store's current contents.
    pub fn capture(store: &InMemoryStore) -> StoreResult<Self> {
        Ok(Self {
            collections: store.export()?,
        })
    }

    /// Replaces a store's contents with this snapshot.
    pub fn restore_into(self, store: &InMemoryStore) -> StoreResult<()> {
        store.import(self.collections)
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
