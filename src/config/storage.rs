//! Local storage configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the indexed local file [`crate::storage::Storage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Root directory for the four storage namespaces.
    pub storage_dir: PathBuf,
    /// Timeout in seconds for `process_knowledge`'s raw-file download step.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,
}

fn default_download_timeout() -> u64 {
    30
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./quantmind_storage"),
            download_timeout: default_download_timeout(),
        }
    }
}
