//! # QuantMind
//!
//! QuantMind ingests unstructured research content (papers, web snippets) and
//! turns it into a persistent, queryable knowledge base of enriched items.
//!
//! The crate is organized around four subsystems that compose into a single
//! pipeline: `Source → Parser → Enricher (Flow / Tagger) → Storage`.
//!
//! - [`config`] — typed configuration loaded from YAML, with env-var
//!   substitution and an explicit flow-type registry.
//! - [`llm`] — provider-agnostic LLM and embedding invocation with retry and
//!   structured-output parsing.
//! - [`storage`] — an indexed, content-addressable local file store.
//! - [`flow`] — the flow runtime (LLM blocks + templates) and built-in flows.
//! - [`models`] — the `KnowledgeItem` content model and its subtypes.
//! - [`tagger`] — LLM-driven tag generation.
//! - [`logging`] — process-wide `tracing-subscriber` setup.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quantmind::config::Setting;
//! use quantmind::storage::Storage;
//!
//! let setting = Setting::from_yaml("quantmind.yaml", None)?;
//! let storage = Storage::new(&setting.storage)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Not `forbid`: `LlmBlock`'s provider-env-var side effect (SPEC_FULL.md
// §4.2) needs `std::env::set_var`, an `unsafe fn` since edition 2024, and
// `forbid` cannot be relaxed by an inner `#[allow(unsafe_code)]` the way
// `deny` can.
#![deny(unsafe_code)]

use thiserror::Error as ThisError;

pub mod config;
pub mod flow;
pub mod llm;
pub mod logging;
pub mod models;
pub mod storage;
pub mod tagger;
pub mod template;

pub use config::Setting;
pub use flow::{BaseFlow, PodcastFlow, SummaryFlow};
pub use llm::{EmbeddingBlock, LlmBlock};
pub use models::{Content, KnowledgeItem, Paper, SearchContent};
pub use storage::Storage;
pub use tagger::LlmTagger;

/// Error type for QuantMind operations.
///
/// Follows the error taxonomy: hard failures (configuration, validation,
/// missing named resources) are raised as typed errors; transient failures
/// on the LLM and download paths degrade to `None` instead (see the
/// `llm` and `storage` modules).
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Unknown component/flow type, missing required YAML section |
/// | `InvalidInput` | Out-of-range config field, conflicting call arguments |
/// | `TemplateNotFound` | `render_prompt` is called with an unregistered template name |
/// | `LlmBlockNotFound` | A flow looks up an LLM block name that was not configured |
/// | `OperationFailed` | Disk I/O fails, (de)serialization fails |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid configuration was supplied.
    ///
    /// Raised when:
    /// - A `{type, config}` section names an unregistered component or flow type
    /// - A required YAML section (e.g., `prompt_templates_path`'s `templates` key) is absent
    /// - A chunking strategy that is rejected at construction time is selected (`BySection`)
    /// - A `chunk_custom_strategy` name has no matching registered chunker
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid input was provided to an operation.
    ///
    /// Raised when:
    /// - A numeric config field is out of its valid range
    /// - `store_raw_file` receives both or neither of `file_path`/`content`
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A flow was asked to render a template name it does not have.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// A flow was asked for an LLM block name it does not have.
    #[error("llm block not found: {0}")]
    LlmBlockNotFound(String),

    /// An operation failed for an underlying I/O or (de)serialization reason.
    ///
    /// Raised when:
    /// - Filesystem I/O fails (read, write, rename, create_dir)
    /// - JSON or YAML (de)serialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for QuantMind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current time as an ISO-8601 UTC timestamp string.
///
/// Centralized so every persisted record (knowledge items, embeddings)
/// stamps time the same way.
#[must_use]
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Configuration("unknown flow type 'bogus'".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: unknown flow type 'bogus'"
        );

        let err = Error::TemplateNotFound("b".to_string());
        assert_eq!(err.to_string(), "template not found: b");

        let err = Error::OperationFailed {
            operation: "write_index".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'write_index' failed: disk full");
    }

    #[test]
    fn test_current_timestamp_is_rfc3339() {
        let ts = current_timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
