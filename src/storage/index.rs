//! Persistent, write-through side index for one storage namespace.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A single index entry: where the referenced file lives, relative to the
/// storage root, and its extension (when the namespace uses one).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to the storage root.
    pub path: String,
    /// File extension, including the leading dot (e.g. `".pdf"`).
    #[serde(default)]
    pub extension: Option<String>,
}

/// An in-memory map from logical ID to [`IndexEntry`], mirrored to a JSON
/// file on disk. Mutations are write-through: every successful change is
/// persisted before the call returns.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    entries: Mutex<HashMap<String, IndexEntry>>,
}

impl Index {
    /// Loads an index from `path`, rebuilding by scanning `namespace_dir`
    /// with `rebuild` if the file is absent or fails to parse (index
    /// corruption, per the error taxonomy, is a warning-and-rebuild, never
    /// a hard failure).
    pub fn load_or_rebuild(
        path: PathBuf,
        namespace_dir: &Path,
        rebuild: impl Fn(&Path) -> crate::Result<HashMap<String, IndexEntry>>,
    ) -> crate::Result<Self> {
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "index file unreadable, rebuilding by scan");
                    rebuild(namespace_dir)?
                }
            },
            Err(_) => rebuild(namespace_dir)?,
        };
        let index = Self {
            path,
            entries: Mutex::new(entries),
        };
        index.persist()?;
        Ok(index)
    }

    fn persist(&self) -> crate::Result<()> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let json = serde_json::to_string_pretty(&*entries).map_err(|e| {
            crate::Error::OperationFailed {
                operation: "serialize_index".to_string(),
                cause: e.to_string(),
            }
        })?;
        atomic_write(&self.path, json.as_bytes())
    }

    /// Inserts or overwrites `id`'s entry and persists the change.
    pub fn set(&self, id: &str, entry: IndexEntry) -> crate::Result<()> {
        {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            entries.insert(id.to_string(), entry);
        }
        self.persist()
    }

    /// Removes `id`'s entry (if present) and persists the change. Returns
    /// whether an entry was actually removed.
    pub fn remove(&self, id: &str) -> crate::Result<bool> {
        let removed = {
            let mut entries = self
                .entries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            entries.remove(id).is_some()
        };
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Returns a clone of `id`'s entry, if indexed.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Prunes a stale entry (file missing on disk) lazily, on the caller's
    /// discovery. Never called proactively.
    pub fn prune(&self, id: &str) -> crate::Result<()> {
        self.remove(id).map(|_| ())
    }

    /// A snapshot of every indexed ID, taken under the lock. Used by
    /// `Storage::get_all_knowledges` to avoid holding the lock for an entire
    /// iteration (see `SPEC_FULL.md` §9's resolution of the snapshot
    /// open question).
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Replaces the entire index (used by `rebuild_all_indexes`) and persists.
    pub fn replace_all(&self, entries: HashMap<String, IndexEntry>) -> crate::Result<()> {
        {
            let mut guard = self
                .entries
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *guard = entries;
        }
        self.persist()
    }

    /// Number of indexed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Writes `contents` to `path` atomically: write to a temp file in the same
/// directory, then rename over the destination. A crash mid-write leaves
/// the original file (or no file) visible, never a half-written one.
pub fn atomic_write(path: &Path, contents: &[u8]) -> crate::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| crate::Error::OperationFailed {
        operation: "create_storage_dir".to_string(),
        cause: e.to_string(),
    })?;

    let mut tmp_path = path.to_path_buf();
    let file_name = format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("write")
    );
    tmp_path.set_file_name(file_name);

    std::fs::write(&tmp_path, contents).map_err(|e| crate::Error::OperationFailed {
        operation: "write_temp_file".to_string(),
        cause: e.to_string(),
    })?;
    std::fs::rename(&tmp_path, path).map_err(|e| crate::Error::OperationFailed {
        operation: "rename_temp_file".to_string(),
        cause: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_on_missing_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("extra").join("knowledges_index.json");
        let ns_dir = dir.path().join("knowledges");
        std::fs::create_dir_all(&ns_dir).unwrap();

        let index = Index::load_or_rebuild(index_path.clone(), &ns_dir, |_| {
            Ok(HashMap::new())
        })
        .unwrap();
        assert!(index.is_empty());
        assert!(index_path.exists());
    }

    #[test]
    fn test_rebuild_on_corrupt_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("extra").join("knowledges_index.json");
        std::fs::create_dir_all(index_path.parent().unwrap()).unwrap();
        std::fs::write(&index_path, "not valid json").unwrap();
        let ns_dir = dir.path().join("knowledges");
        std::fs::create_dir_all(&ns_dir).unwrap();

        let mut rebuilt_called = false;
        let index = Index::load_or_rebuild(index_path, &ns_dir, |_| {
            rebuilt_called = true;
            Ok(HashMap::new())
        })
        .unwrap();
        assert!(rebuilt_called);
        assert!(index.is_empty());
    }

    #[test]
    fn test_set_and_get_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("extra").join("knowledges_index.json");
        let ns_dir = dir.path().join("knowledges");
        std::fs::create_dir_all(&ns_dir).unwrap();
        let index = Index::load_or_rebuild(index_path.clone(), &ns_dir, |_| Ok(HashMap::new())).unwrap();

        index
            .set(
                "x",
                IndexEntry {
                    path: "knowledges/x.json".to_string(),
                    extension: None,
                },
            )
            .unwrap();

        let reloaded = Index::load_or_rebuild(index_path, &ns_dir, |_| Ok(HashMap::new())).unwrap();
        assert_eq!(reloaded.get("x").unwrap().path, "knowledges/x.json");
    }

    #[test]
    fn test_rebuild_all_indexes_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("extra").join("knowledges_index.json");
        let ns_dir = dir.path().join("knowledges");
        std::fs::create_dir_all(&ns_dir).unwrap();
        let index = Index::load_or_rebuild(index_path, &ns_dir, |_| Ok(HashMap::new())).unwrap();

        let mut entries = HashMap::new();
        entries.insert(
            "a".to_string(),
            IndexEntry {
                path: "knowledges/a.json".to_string(),
                extension: None,
            },
        );
        index.replace_all(entries.clone()).unwrap();
        let first = index.snapshot_ids();
        index.replace_all(entries).unwrap();
        let second = index.snapshot_ids();
        assert_eq!(first, second);
    }
}
