//! Podcast-script sketch flow: three optional sections, each independently
//! present or absent depending on which block/template pair was configured.

use super::BaseFlow;
use crate::config::flow::FlowConfig;
use std::collections::HashMap;

/// The assembled sections of a podcast script. Each field is `None` when
/// either its LLM block or its template was not configured — absence of
/// either is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodcastResult {
    /// Rendered introduction, if `intro_generator`/`intro_prompt` are both present.
    pub intro: Option<String>,
    /// Rendered main segment, if `main_generator`/`main_prompt` are both present.
    pub main: Option<String>,
    /// Rendered outro, if `outro_generator`/`outro_prompt` are both present.
    pub outro: Option<String>,
}

/// A sketch flow assembling a three-section podcast script from a summary.
pub struct PodcastFlow {
    base: BaseFlow,
}

impl PodcastFlow {
    /// Builds a [`PodcastFlow`] from its config.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if any prompt template fails
    /// to compile.
    pub fn new(config: &FlowConfig) -> crate::Result<Self> {
        Ok(Self { base: BaseFlow::new(config)? })
    }

    /// Assembles a three-section script from `summary`. A pre-supplied
    /// `intro`/`outro` is used as-is; when omitted, that section falls back
    /// to rendering whichever of its LLM block/template pair is configured.
    /// `main` is always generated from `summary`.
    #[must_use]
    pub fn run(&self, summary: &str, intro: Option<&str>, outro: Option<&str>) -> PodcastResult {
        PodcastResult {
            intro: intro
                .map(str::to_string)
                .or_else(|| self.render_section("intro_generator", "intro_prompt", summary)),
            main: self.render_section("main_generator", "main_prompt", summary),
            outro: outro
                .map(str::to_string)
                .or_else(|| self.render_section("outro_generator", "outro_prompt", summary)),
        }
    }

    fn render_section(&self, block_name: &str, template_name: &str, summary: &str) -> Option<String> {
        let block = self.base.llm_block(block_name).ok()?;
        let vars = HashMap::from([("summary".to_string(), summary.to_string())]);
        let prompt = self.base.render_prompt(template_name, vars).ok()?;
        block.generate_text(&prompt, None, Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn test_run_leaves_unconfigured_sections_as_none() {
        let config = FlowConfig::default();
        let flow = PodcastFlow::new(&config).unwrap();
        let result = flow.run("a summary", None, None);
        assert_eq!(result, PodcastResult::default());
    }

    #[test]
    fn test_run_skips_section_missing_its_template_even_with_block_present() {
        let mut config = FlowConfig::default();
        config.llm_blocks.insert("intro_generator".to_string(), LlmConfig::default());
        let flow = PodcastFlow::new(&config).unwrap();
        let result = flow.run("a summary", None, None);
        assert!(result.intro.is_none());
    }

    #[test]
    fn test_run_skips_section_missing_its_block_even_with_template_present() {
        let mut config = FlowConfig::default();
        config.prompt_templates.insert("outro_prompt".to_string(), "Bye: {{ summary }}".to_string());
        let flow = PodcastFlow::new(&config).unwrap();
        let result = flow.run("a summary", None, None);
        assert!(result.outro.is_none());
    }

    #[test]
    fn test_run_uses_presupplied_intro_and_outro_without_configuration() {
        let config = FlowConfig::default();
        let flow = PodcastFlow::new(&config).unwrap();
        let result = flow.run("a summary", Some("Welcome!"), Some("Thanks for listening."));
        assert_eq!(result.intro.as_deref(), Some("Welcome!"));
        assert_eq!(result.outro.as_deref(), Some("Thanks for listening."));
        assert!(result.main.is_none());
    }
}
