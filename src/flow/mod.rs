//! Flow runtime: a resource-container abstraction (LLM blocks + prompt
//! templates) that concrete flows orchestrate imperatively.
//!
//! [`BaseFlow`] is the shared capability set every flow is built on top of;
//! [`SummaryFlow`] and [`PodcastFlow`] are the concrete flows built from it.

mod podcast;
mod summary;

pub use podcast::{PodcastFlow, PodcastResult};
pub use summary::SummaryFlow;

use crate::config::flow::BaseFlowConfig;
use crate::llm::LlmBlock;
use crate::template::TemplateMap;
use std::collections::HashMap;

/// Shared resource container for concrete flows: a name-addressable map of
/// LLM blocks and a compiled map of prompt templates.
pub struct BaseFlow {
    llm_blocks: HashMap<String, Option<LlmBlock>>,
    templates: TemplateMap,
}

impl BaseFlow {
    /// Builds the resource container from a flow config.
    ///
    /// Per-block instantiation failures (an invalid `LlmConfig`) are
    /// logged and recorded as `None` rather than failing construction —
    /// only a missing/invalid *template* is a hard construction-time
    /// error, since templates are this crate's one piece of the resource
    /// set without a graceful degraded state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if any prompt template fails
    /// to compile.
    pub fn new(config: &dyn BaseFlowConfig) -> crate::Result<Self> {
        let mut llm_blocks = HashMap::with_capacity(config.llm_blocks().len());
        for (name, llm_config) in config.llm_blocks() {
            match llm_config.validate() {
                Ok(()) => {
                    llm_blocks.insert(name.clone(), Some(LlmBlock::new(llm_config.clone())));
                }
                Err(e) => {
                    tracing::warn!(block = %name, error = %e, "llm block failed to initialize");
                    llm_blocks.insert(name.clone(), None);
                }
            }
        }
        let templates = TemplateMap::new(config.prompt_templates())?;
        Ok(Self { llm_blocks, templates })
    }

    /// Renders the named template.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TemplateNotFound`] if `name` is not
    /// registered, or a render-time error if a referenced variable is
    /// missing.
    pub fn render_prompt(&self, name: &str, vars: HashMap<String, String>) -> crate::Result<String> {
        self.templates.render(name, &vars)
    }

    /// Looks up an LLM block by name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LlmBlockNotFound`] if `name` was never
    /// configured, or if it was configured but failed to initialize.
    pub fn llm_block(&self, name: &str) -> crate::Result<&LlmBlock> {
        match self.llm_blocks.get(name) {
            Some(Some(block)) => Ok(block),
            Some(None) | None => Err(crate::Error::LlmBlockNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::flow::FlowConfig;
    use crate::config::LlmConfig;

    #[test]
    fn test_render_prompt_missing_template_names_it() {
        let mut config = FlowConfig::default();
        config.prompt_templates.insert("a".to_string(), "static".to_string());
        let flow = BaseFlow::new(&config).unwrap();
        let err = flow.render_prompt("b", HashMap::new()).unwrap_err();
        assert!(err.to_string().contains('b'));
    }

    #[test]
    fn test_llm_block_missing_name_is_not_found() {
        let config = FlowConfig::default();
        let flow = BaseFlow::new(&config).unwrap();
        assert!(flow.llm_block("nonexistent").is_err());
    }

    #[test]
    fn test_invalid_llm_block_config_degrades_to_missing_rather_than_failing_construction() {
        let mut config = FlowConfig::default();
        config.llm_blocks.insert(
            "bad".to_string(),
            LlmConfig {
                max_tokens: 0,
                ..Default::default()
            },
        );
        let flow = BaseFlow::new(&config).unwrap();
        assert!(flow.llm_block("bad").is_err());
    }
}
