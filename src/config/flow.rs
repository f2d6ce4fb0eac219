//! Flow configuration types.

use crate::config::llm::LlmConfig;
use crate::config::registry::lookup_chunker;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;

/// Common surface every flow-config type exposes, so the registry and the
/// generic parts of [`crate::flow::BaseFlow`] can work with any flow type
/// without knowing its concrete shape.
pub trait BaseFlowConfig: Send + Sync + std::fmt::Debug {
    /// The flow instance's name.
    fn name(&self) -> &str;
    /// Named LLM-block configurations.
    fn llm_blocks(&self) -> &HashMap<String, LlmConfig>;
    /// Named prompt templates (Tera syntax).
    fn prompt_templates(&self) -> &HashMap<String, String>;
    /// Allows downcasting to a concrete flow-config type.
    fn as_any(&self) -> &dyn Any;
}

/// A top-level `templates:` document loaded via `prompt_templates_path`.
#[derive(Debug, Deserialize)]
struct TemplatesFile {
    templates: HashMap<String, String>,
}

/// Loads `prompt_templates` from a `templates:` YAML file, per
/// `FlowConfig::prompt_templates_path`'s construction-time behavior.
///
/// # Errors
///
/// Returns [`crate::Error::Configuration`] if the file cannot be read,
/// parsed, or is missing the required `templates` section.
pub fn load_prompt_templates_file(path: &PathBuf) -> crate::Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Configuration(format!(
            "failed to read prompt templates file {}: {e}",
            path.display()
        ))
    })?;
    let file: TemplatesFile = serde_yaml_ng::from_str(&text).map_err(|e| {
        crate::Error::Configuration(format!(
            "prompt templates file {} must contain a top-level 'templates' mapping: {e}",
            path.display()
        ))
    })?;
    Ok(file.templates)
}

/// Base configuration shared by every flow: named LLM blocks and named
/// prompt templates, optionally loaded from an external file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// The flow instance's name.
    #[serde(default)]
    pub name: String,
    /// Named LLM-block configurations.
    #[serde(default)]
    pub llm_blocks: HashMap<String, LlmConfig>,
    /// Named prompt templates (Tera syntax), either given inline or loaded
    /// from `prompt_templates_path`.
    #[serde(default)]
    pub prompt_templates: HashMap<String, String>,
    /// Path to a YAML file with a top-level `templates:` mapping. If set,
    /// its contents populate `prompt_templates` at construction time.
    #[serde(default)]
    pub prompt_templates_path: Option<PathBuf>,
}

impl FlowConfig {
    /// Builds a [`FlowConfig`], loading `prompt_templates_path` if set.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if the templates file is set
    /// but cannot be loaded.
    pub fn new(mut self) -> crate::Result<Self> {
        if let Some(path) = self.prompt_templates_path.clone() {
            self.prompt_templates = load_prompt_templates_file(&path)?;
        }
        Ok(self)
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            llm_blocks: HashMap::new(),
            prompt_templates: HashMap::new(),
            prompt_templates_path: None,
        }
    }
}

impl BaseFlowConfig for FlowConfig {
    fn name(&self) -> &str {
        &self.name
    }
    fn llm_blocks(&self) -> &HashMap<String, LlmConfig> {
        &self.llm_blocks
    }
    fn prompt_templates(&self) -> &HashMap<String, String> {
        &self.prompt_templates
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Chunking strategy for [`SummaryFlowConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkingStrategy {
    /// Stride-walk by character count, trimming to a whitespace boundary.
    BySize,
    /// Call a chunker registered by name (see [`crate::config::registry::register_chunker`]).
    ByCustom,
    /// Split along document section boundaries.
    ///
    /// Rejected at [`SummaryFlowConfig::validate_construction`] time — never
    /// reached by [`crate::flow::SummaryFlow::run`].
    BySection,
}

/// Configuration for [`crate::flow::SummaryFlow`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryFlowConfig {
    /// The wrapped base flow config (LLM blocks + templates).
    #[serde(flatten)]
    pub base: FlowConfig,
    /// Whether to chunk the document before summarizing (`true`) or
    /// summarize the full content directly with `powerful_combiner` (`false`).
    #[serde(default = "default_use_chunking")]
    pub use_chunking: bool,
    /// Target chunk size in characters, for `BySize`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Chunking strategy.
    #[serde(default = "default_chunk_strategy")]
    pub chunk_strategy: ChunkingStrategy,
    /// Name of a registered chunker, required when `chunk_strategy` is `ByCustom`.
    #[serde(default)]
    pub chunk_custom_strategy: Option<String>,
}

fn default_use_chunking() -> bool {
    true
}
fn default_chunk_size() -> usize {
    2000
}
fn default_chunk_strategy() -> ChunkingStrategy {
    ChunkingStrategy::BySize
}

impl SummaryFlowConfig {
    /// Builds a [`SummaryFlowConfig`] with QuantMind's default LLM blocks
    /// (`cheap_summarizer`, `powerful_combiner`) and default templates
    /// (`summarize_chunk_template`, `combine_summaries_template`) populated
    /// only when the caller supplied neither map.
    #[must_use]
    pub fn with_defaults(mut base: FlowConfig) -> Self {
        if base.llm_blocks.is_empty() {
            base.llm_blocks.insert(
                "cheap_summarizer".to_string(),
                LlmConfig {
                    model: "gpt-4o-mini".to_string(),
                    temperature: 0.3,
                    max_tokens: 1000,
                    ..Default::default()
                },
            );
            base.llm_blocks.insert(
                "powerful_combiner".to_string(),
                LlmConfig {
                    model: "gpt-4o".to_string(),
                    temperature: 0.3,
                    max_tokens: 2000,
                    ..Default::default()
                },
            );
        }
        if base.prompt_templates.is_empty() {
            base.prompt_templates.insert(
                "summarize_chunk_template".to_string(),
                "Summarize the following text concisely:\n\n{{ chunk_text }}".to_string(),
            );
            base.prompt_templates.insert(
                "combine_summaries_template".to_string(),
                "Combine the following chunk summaries into one coherent summary:\n\n{{ summaries }}"
                    .to_string(),
            );
        }
        Self {
            base,
            use_chunking: true,
            chunk_size: 2000,
            chunk_strategy: ChunkingStrategy::BySize,
            chunk_custom_strategy: None,
        }
    }

    /// Validates construction-time invariants: `BySection` is rejected
    /// eagerly (REDESIGN: the original only raises this once the flow
    /// actually runs), and `ByCustom` requires a chunker already registered
    /// under `chunk_custom_strategy`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if `BySection` is selected or
    /// `ByCustom` names an unregistered chunker.
    pub fn validate_construction(&self) -> crate::Result<()> {
        match self.chunk_strategy {
            ChunkingStrategy::BySection => Err(crate::Error::Configuration(
                "chunking by section is not implemented for this flow".to_string(),
            )),
            ChunkingStrategy::ByCustom => {
                let name = self.chunk_custom_strategy.as_deref().ok_or_else(|| {
                    crate::Error::Configuration(
                        "chunk_strategy is ByCustom but chunk_custom_strategy is not set"
                            .to_string(),
                    )
                })?;
                if lookup_chunker(name).is_none() {
                    return Err(crate::Error::Configuration(format!(
                        "no chunker registered under name '{name}'"
                    )));
                }
                Ok(())
            }
            ChunkingStrategy::BySize => Ok(()),
        }
    }
}

impl BaseFlowConfig for SummaryFlowConfig {
    fn name(&self) -> &str {
        &self.base.name
    }
    fn llm_blocks(&self) -> &HashMap<String, LlmConfig> {
        &self.base.llm_blocks
    }
    fn prompt_templates(&self) -> &HashMap<String, String> {
        &self.base.prompt_templates
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_section_rejected_at_construction() {
        let config = SummaryFlowConfig {
            chunk_strategy: ChunkingStrategy::BySection,
            ..SummaryFlowConfig::with_defaults(FlowConfig::default())
        };
        let err = config.validate_construction().unwrap_err();
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_by_custom_without_registration_rejected() {
        let config = SummaryFlowConfig {
            chunk_strategy: ChunkingStrategy::ByCustom,
            chunk_custom_strategy: Some("nonexistent_chunker_xyz".to_string()),
            ..SummaryFlowConfig::with_defaults(FlowConfig::default())
        };
        assert!(config.validate_construction().is_err());
    }

    #[test]
    fn test_by_size_accepted() {
        let config = SummaryFlowConfig::with_defaults(FlowConfig::default());
        assert!(config.validate_construction().is_ok());
    }

    #[test]
    fn test_with_defaults_populates_blocks_and_templates() {
        let config = SummaryFlowConfig::with_defaults(FlowConfig::default());
        assert!(config.llm_blocks().contains_key("cheap_summarizer"));
        assert!(config.llm_blocks().contains_key("powerful_combiner"));
        assert!(config
            .prompt_templates()
            .contains_key("summarize_chunk_template"));
        assert!(config
            .prompt_templates()
            .contains_key("combine_summaries_template"));
    }

    #[test]
    fn test_with_defaults_leaves_user_values_untouched() {
        let mut base = FlowConfig::default();
        base.llm_blocks.insert("only_one".to_string(), LlmConfig::default());
        let config = SummaryFlowConfig::with_defaults(base);
        assert_eq!(config.llm_blocks().len(), 1);
        assert!(config.llm_blocks().contains_key("only_one"));
    }

    #[test]
    fn test_new_loads_prompt_templates_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.yaml");
        std::fs::write(
            &path,
            "templates:\n  greeting: \"Hello, {{ name }}!\"\n",
        )
        .unwrap();

        let config = FlowConfig {
            prompt_templates_path: Some(path),
            ..FlowConfig::default()
        }
        .new()
        .unwrap();

        assert_eq!(
            config.prompt_templates.get("greeting").map(String::as_str),
            Some("Hello, {{ name }}!")
        );
    }

    #[test]
    fn test_new_fails_when_templates_file_missing_templates_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.yaml");
        std::fs::write(&path, "not_templates: {}\n").unwrap();

        let err = FlowConfig {
            prompt_templates_path: Some(path),
            ..FlowConfig::default()
        }
        .new()
        .unwrap_err();
        assert!(matches!(err, crate::Error::Configuration(_)));
    }
}
