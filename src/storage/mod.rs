//! Indexed, content-addressable local file storage.
//!
//! Four parallel namespaces under one root directory — `raw_files/`,
//! `knowledges/`, `embeddings/`, `extra/` — each backed by a write-through
//! [`index::Index`] persisted under `extra/`. See `SPEC_FULL.md` §4.3.

pub mod index;

use crate::config::LocalStorageConfig;
use crate::models::knowledge::Content;
use index::{atomic_write, Index, IndexEntry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One persisted embedding record.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// The knowledge item this embedding was computed for.
    pub knowledge_id: String,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// The model used to compute it.
    pub model: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

/// The indexed local store.
pub struct Storage {
    root: PathBuf,
    download_timeout: u64,
    raw_files_index: Index,
    knowledges_index: Index,
    embeddings_index: Index,
    http_client: reqwest::blocking::Client,
}

impl Storage {
    /// Opens (creating if necessary) a store rooted at
    /// `config.storage_dir`, loading or rebuilding all three indexes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OperationFailed`] if the namespace
    /// directories cannot be created.
    pub fn new(config: &LocalStorageConfig) -> crate::Result<Self> {
        let root = config.storage_dir.clone();
        for dir in ["raw_files", "knowledges", "embeddings", "extra"] {
            std::fs::create_dir_all(root.join(dir)).map_err(|e| crate::Error::OperationFailed {
                operation: "create_storage_dir".to_string(),
                cause: e.to_string(),
            })?;
        }

        let raw_files_dir = root.join("raw_files");
        let knowledges_dir = root.join("knowledges");
        let embeddings_dir = root.join("embeddings");

        let raw_files_index = Index::load_or_rebuild(
            root.join("extra").join("raw_files_index.json"),
            &raw_files_dir,
            scan_raw_files,
        )?;
        let knowledges_index = Index::load_or_rebuild(
            root.join("extra").join("knowledges_index.json"),
            &knowledges_dir,
            |dir| scan_json_namespace(dir, "knowledges"),
        )?;
        let embeddings_index = Index::load_or_rebuild(
            root.join("extra").join("embeddings_index.json"),
            &embeddings_dir,
            |dir| scan_json_namespace(dir, "embeddings"),
        )?;

        Ok(Self {
            root,
            download_timeout: config.download_timeout,
            raw_files_index,
            knowledges_index,
            embeddings_index,
            http_client: reqwest::blocking::Client::new(),
        })
    }

    fn namespace_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    // ---- raw files ----------------------------------------------------

    /// Stores a raw file under `file_id`, from either `file_path` or
    /// `content` (exactly one must be given). Returns the absolute path
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if both or neither of
    /// `file_path`/`content` are given, or [`crate::Error::OperationFailed`]
    /// on I/O failure.
    pub fn store_raw_file(
        &self,
        file_id: &str,
        file_path: Option<&Path>,
        content: Option<&[u8]>,
        file_extension: Option<&str>,
    ) -> crate::Result<PathBuf> {
        let bytes: Vec<u8> = match (file_path, content) {
            (Some(_), Some(_)) | (None, None) => {
                return Err(crate::Error::InvalidInput(
                    "exactly one of file_path or content is required".to_string(),
                ))
            }
            (Some(path), None) => std::fs::read(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_source_file".to_string(),
                cause: e.to_string(),
            })?,
            (None, Some(bytes)) => bytes.to_vec(),
        };

        let extension = file_extension
            .map(str::to_string)
            .or_else(|| file_path.and_then(|p| p.extension()).map(|e| format!(".{}", e.to_string_lossy())))
            .unwrap_or_default();

        let file_name = format!("{file_id}{extension}");
        let relative = format!("raw_files/{file_name}");
        let absolute = self.absolute(&relative);
        atomic_write(&absolute, &bytes)?;

        self.raw_files_index.set(
            file_id,
            IndexEntry {
                path: relative,
                extension: if extension.is_empty() { None } else { Some(extension) },
            },
        )?;
        Ok(absolute)
    }

    /// Looks up a raw file by ID. O(1) via the index; self-heals a stale
    /// entry (file missing on disk) by pruning it; falls back to a
    /// directory scan when the ID was never indexed, backfilling the index
    /// on a hit.
    #[must_use]
    pub fn get_raw_file(&self, file_id: &str) -> Option<PathBuf> {
        if let Some(entry) = self.raw_files_index.get(file_id) {
            let absolute = self.absolute(&entry.path);
            if absolute.exists() {
                return Some(absolute);
            }
            let _ = self.raw_files_index.prune(file_id);
            return None;
        }

        let dir = self.namespace_dir("raw_files");
        let entries = std::fs::read_dir(&dir).ok()?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = file_stem(&path) else { continue };
            if stem == file_id {
                let extension = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|name| name.strip_prefix(stem.as_str()))
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                let relative = format!("raw_files/{}", path.file_name()?.to_str()?);
                let _ = self.raw_files_index.set(file_id, IndexEntry { path: relative, extension });
                return Some(path);
            }
        }
        None
    }

    /// Deletes a raw file and its index entry. Returns whether anything was
    /// actually removed.
    pub fn delete_raw_file(&self, file_id: &str) -> crate::Result<bool> {
        if let Some(path) = self.get_raw_file(file_id) {
            std::fs::remove_file(&path).map_err(|e| crate::Error::OperationFailed {
                operation: "delete_raw_file".to_string(),
                cause: e.to_string(),
            })?;
        }
        self.raw_files_index.remove(file_id)
    }

    // ---- knowledge items ------------------------------------------------

    /// Serializes `item` to `knowledges/{primary_id}.json`, overwriting any
    /// existing record under the same ID. Returns the primary ID.
    pub fn store_knowledge(&self, item: &Content) -> crate::Result<String> {
        let id = item.get_primary_id();
        let json = serde_json::to_string_pretty(item).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_knowledge".to_string(),
            cause: e.to_string(),
        })?;
        let relative = format!("knowledges/{id}.json");
        atomic_write(&self.absolute(&relative), json.as_bytes())?;
        self.knowledges_index.set(&id, IndexEntry { path: relative, extension: None })?;
        Ok(id)
    }

    /// Looks up a knowledge item by primary ID, deserializing into the
    /// correct subtype based on the stored `content_type` discriminator.
    /// Self-heals and falls back to a directory scan the same way
    /// [`Storage::get_raw_file`] does.
    #[must_use]
    pub fn get_knowledge(&self, id: &str) -> Option<Content> {
        if let Some(entry) = self.knowledges_index.get(id) {
            let absolute = self.absolute(&entry.path);
            return match std::fs::read_to_string(&absolute) {
                Ok(text) => serde_json::from_str(&text).ok(),
                Err(_) => {
                    let _ = self.knowledges_index.prune(id);
                    None
                }
            };
        }

        let dir = self.namespace_dir("knowledges");
        let path = dir.join(format!("{id}.json"));
        if !path.exists() {
            return None;
        }
        let text = std::fs::read_to_string(&path).ok()?;
        let content: Content = serde_json::from_str(&text).ok()?;
        let relative = format!("knowledges/{id}.json");
        let _ = self.knowledges_index.set(id, IndexEntry { path: relative, extension: None });
        Some(content)
    }

    /// Returns every indexed knowledge item.
    ///
    /// Snapshots the index's key set under its lock, then releases the
    /// lock and reads each item individually (see `SPEC_FULL.md` §9's
    /// resolution of the "snapshot vs. live iteration" open question).
    #[must_use]
    pub fn get_all_knowledges(&self) -> Vec<Content> {
        self.knowledges_index
            .snapshot_ids()
            .into_iter()
            .filter_map(|id| self.get_knowledge(&id))
            .collect()
    }

    /// Stores the item, then for `Paper` subtypes with a `pdf_url` and no
    /// existing raw file, attempts one blocking HTTP GET to populate the
    /// raw file. Download failures are logged and swallowed — the
    /// knowledge record is stored regardless.
    pub fn process_knowledge(&self, item: Content) -> crate::Result<String> {
        let id = self.store_knowledge(&item)?;
        if let Content::Paper(paper) = &item {
            if self.get_raw_file(&id).is_none() {
                if let Some(pdf_url) = &paper.pdf_url {
                    self.try_download_pdf(&id, pdf_url);
                }
            }
        }
        Ok(id)
    }

    fn try_download_pdf(&self, id: &str, pdf_url: &str) {
        let result = self
            .http_client
            .get(pdf_url)
            .timeout(std::time::Duration::from_secs(self.download_timeout))
            .send()
            .and_then(reqwest::blocking::Response::bytes);
        match result {
            Ok(bytes) => {
                if let Err(e) = self.store_raw_file(id, None, Some(&bytes), Some(".pdf")) {
                    tracing::warn!(id, error = %e, "failed to store downloaded pdf");
                }
            }
            Err(e) => {
                tracing::warn!(id, url = %pdf_url, error = %e, "pdf download failed, continuing without raw file");
            }
        }
    }

    /// Ordered fold of [`Storage::process_knowledge`] over `items`.
    pub fn process_knowledges(&self, items: Vec<Content>) -> crate::Result<Vec<String>> {
        items.into_iter().map(|item| self.process_knowledge(item)).collect()
    }

    // ---- embeddings -----------------------------------------------------

    /// Stores `{knowledge_id, vector, model, created_at}` for `id`,
    /// overwriting any existing embedding (last write wins).
    pub fn store_embedding(&self, id: &str, vector: Vec<f32>, model: &str) -> crate::Result<()> {
        let record = EmbeddingRecord {
            knowledge_id: id.to_string(),
            embedding: vector,
            model: model.to_string(),
            created_at: crate::current_timestamp(),
        };
        let json = serde_json::to_string_pretty(&record).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_embedding".to_string(),
            cause: e.to_string(),
        })?;
        let relative = format!("embeddings/{id}.json");
        atomic_write(&self.absolute(&relative), json.as_bytes())?;
        self.embeddings_index.set(id, IndexEntry { path: relative, extension: None })?;
        Ok(())
    }

    /// Looks up an embedding by knowledge ID, self-healing and falling back
    /// to scan symmetrically with [`Storage::get_knowledge`].
    #[must_use]
    pub fn get_embedding(&self, id: &str) -> Option<EmbeddingRecord> {
        if let Some(entry) = self.embeddings_index.get(id) {
            let absolute = self.absolute(&entry.path);
            return match std::fs::read_to_string(&absolute) {
                Ok(text) => serde_json::from_str(&text).ok(),
                Err(_) => {
                    let _ = self.embeddings_index.prune(id);
                    None
                }
            };
        }
        let dir = self.namespace_dir("embeddings");
        let path = dir.join(format!("{id}.json"));
        if !path.exists() {
            return None;
        }
        let text = std::fs::read_to_string(&path).ok()?;
        let record: EmbeddingRecord = serde_json::from_str(&text).ok()?;
        let relative = format!("embeddings/{id}.json");
        let _ = self.embeddings_index.set(id, IndexEntry { path: relative, extension: None });
        Some(record)
    }

    // ---- extras ---------------------------------------------------------

    /// Stores an arbitrary JSON-serializable payload under `key`, in the
    /// plain `extra/` namespace (no index — extras are looked up directly
    /// by filename).
    pub fn store_extra(&self, key: &str, value: &serde_json::Value) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| crate::Error::OperationFailed {
            operation: "serialize_extra".to_string(),
            cause: e.to_string(),
        })?;
        atomic_write(&self.namespace_dir("extra").join(format!("{key}.json")), json.as_bytes())
    }

    /// Reads an extra payload by key, or `None` if absent/unreadable.
    #[must_use]
    pub fn get_extra(&self, key: &str) -> Option<serde_json::Value> {
        let text = std::fs::read_to_string(self.namespace_dir("extra").join(format!("{key}.json"))).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Deletes an extra payload by key. Returns whether a file was removed.
    pub fn delete_extra(&self, key: &str) -> crate::Result<bool> {
        let path = self.namespace_dir("extra").join(format!("{key}.json"));
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| crate::Error::OperationFailed {
            operation: "delete_extra".to_string(),
            cause: e.to_string(),
        })?;
        Ok(true)
    }

    // ---- index maintenance ----------------------------------------------

    /// Clears and rebuilds all three indexes by scanning their namespace
    /// directories. Idempotent: running it twice yields identical indexes.
    pub fn rebuild_all_indexes(&self) -> crate::Result<()> {
        let raw_files = scan_raw_files(&self.namespace_dir("raw_files"))?;
        self.raw_files_index.replace_all(raw_files)?;

        let knowledges = scan_json_namespace(&self.namespace_dir("knowledges"), "knowledges")?;
        self.knowledges_index.replace_all(knowledges)?;

        let embeddings = scan_json_namespace(&self.namespace_dir("embeddings"), "embeddings")?;
        self.embeddings_index.replace_all(embeddings)?;

        Ok(())
    }
}

/// Everything before the last `.` in a file name — the file-ID stem
/// convention used across `raw_files/` scan-based rebuilds.
fn file_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(name[..idx].to_string()),
        _ => Some(name.to_string()),
    }
}

fn scan_raw_files(dir: &Path) -> crate::Result<HashMap<String, IndexEntry>> {
    let mut entries = HashMap::new();
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Ok(entries);
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(stem) = file_stem(&path) else { continue };
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let extension = file_name.strip_prefix(stem.as_str()).filter(|s| !s.is_empty()).map(str::to_string);
        entries.insert(
            stem,
            IndexEntry {
                path: format!("raw_files/{file_name}"),
                extension,
            },
        );
    }
    Ok(entries)
}

fn scan_json_namespace(dir: &Path, namespace: &str) -> crate::Result<HashMap<String, IndexEntry>> {
    let mut entries = HashMap::new();
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Ok(entries);
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        entries.insert(
            id.to_string(),
            IndexEntry {
                path: format!("{namespace}/{file_name}"),
                extension: None,
            },
        );
    }
    Ok(entries)
}
