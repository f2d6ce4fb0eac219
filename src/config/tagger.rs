//! LLM tagger configuration.

use crate::config::llm::LlmConfig;
use serde::{Deserialize, Serialize};

/// Configuration for [`crate::tagger::LlmTagger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmTaggerConfig {
    /// LLM call configuration used to generate tags.
    #[serde(flatten)]
    pub llm: LlmConfig,
    /// Maximum number of tags to keep after parsing/normalizing.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    /// Optional custom prompt template, substituting `{content}`/`{max_tags}`.
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// Extra free-text instructions appended to the default prompt.
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

fn default_max_tags() -> usize {
    10
}

impl Default for LlmTaggerConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            max_tags: default_max_tags(),
            custom_prompt: None,
            custom_instructions: None,
        }
    }
}
