//! Two-stage map/reduce summarization with pluggable chunking.

use super::BaseFlow;
use crate::config::flow::{ChunkingStrategy, SummaryFlowConfig};
use crate::config::registry::lookup_chunker;
use crate::models::knowledge::Content;
use std::collections::HashMap;

/// The canonical non-trivial flow: summarizes a knowledge item's `content`
/// either directly or via a cheap-map/powerful-reduce chunking pipeline.
pub struct SummaryFlow {
    base: BaseFlow,
    use_chunking: bool,
    chunk_size: usize,
    chunk_strategy: ChunkingStrategy,
    chunk_custom_strategy: Option<String>,
}

impl SummaryFlow {
    /// Builds a [`SummaryFlow`] from its config.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Configuration`] if `chunk_strategy` is
    /// `BySection` (rejected at construction, never at run time) or any
    /// prompt template fails to compile.
    pub fn new(config: &SummaryFlowConfig) -> crate::Result<Self> {
        config.validate_construction()?;
        Ok(Self {
            base: BaseFlow::new(config)?,
            use_chunking: config.use_chunking,
            chunk_size: config.chunk_size,
            chunk_strategy: config.chunk_strategy,
            chunk_custom_strategy: config.chunk_custom_strategy.clone(),
        })
    }

    /// Runs the summarization algorithm described in `SPEC_FULL.md` §4.4.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LlmBlockNotFound`] or
    /// [`crate::Error::TemplateNotFound`] if a required named resource is
    /// missing — LLM calls themselves degrade softly (a `None` response is
    /// treated as empty and the algorithm falls through to its next
    /// fallback) rather than propagating an error.
    pub fn run(&self, item: &Content) -> crate::Result<String> {
        let Some(content) = item.content().filter(|c| !c.is_empty()) else {
            return Ok("No content available for summarization.".to_string());
        };

        if !self.use_chunking {
            let prompt = self.base.render_prompt(
                "summarize_chunk_template",
                HashMap::from([("chunk_text".to_string(), content.to_string())]),
            )?;
            let combiner = self.base.llm_block("powerful_combiner")?;
            return Ok(combiner
                .generate_text(&prompt, None, Default::default())
                .unwrap_or_else(|| "Failed to summarize content.".to_string()));
        }

        let chunks = self.chunk(content);
        let mut summaries = Vec::with_capacity(chunks.len());
        let cheap_summarizer = self.base.llm_block("cheap_summarizer")?;
        for chunk in &chunks {
            let prompt = self.base.render_prompt(
                "summarize_chunk_template",
                HashMap::from([("chunk_text".to_string(), chunk.clone())]),
            )?;
            if let Some(summary) = cheap_summarizer.generate_text(&prompt, None, Default::default()) {
                if !summary.is_empty() {
                    summaries.push(summary);
                }
            }
        }

        if summaries.is_empty() {
            return Ok("Failed to summarize content.".to_string());
        }
        if summaries.len() == 1 {
            return Ok(summaries.into_iter().next().unwrap_or_default());
        }

        let joined = summaries.join("\n\n");
        let prompt = self
            .base
            .render_prompt("combine_summaries_template", HashMap::from([("summaries".to_string(), joined)]))?;
        let combiner = self.base.llm_block("powerful_combiner")?;
        Ok(combiner
            .generate_text(&prompt, None, Default::default())
            .unwrap_or_else(|| "Failed to generate final summary.".to_string()))
    }

    fn chunk(&self, content: &str) -> Vec<String> {
        match self.chunk_strategy {
            ChunkingStrategy::BySize => chunk_by_size(content, self.chunk_size),
            ChunkingStrategy::ByCustom => {
                let name = self.chunk_custom_strategy.as_deref();
                match name.and_then(lookup_chunker) {
                    Some(chunker) => chunker(content),
                    None => {
                        tracing::warn!(
                            "custom chunking strategy specified but no function registered, falling back to BySize"
                        );
                        chunk_by_size(content, self.chunk_size)
                    }
                }
            }
            ChunkingStrategy::BySection => unreachable!("rejected at construction"),
        }
    }
}

/// Stride-walks `content` in `chunk_size`-character steps; for every
/// non-final chunk, trims back to the last whitespace boundary when that
/// boundary lies past the chunk's midpoint, then strips the piece.
fn chunk_by_size(content: &str, chunk_size: usize) -> Vec<String> {
    if chunk_size == 0 {
        return vec![content.trim().to_string()];
    }
    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + chunk_size).min(len);
        let is_final = end >= len;
        if !is_final {
            let midpoint = start + chunk_size / 2;
            if let Some(boundary) = last_whitespace_index(&chars, start, end) {
                if boundary > midpoint {
                    end = boundary;
                }
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        start = end;
        while start < len && chars[start].is_whitespace() {
            start += 1;
        }
    }
    chunks
}

fn last_whitespace_index(chars: &[char], start: usize, end: usize) -> Option<usize> {
    (start..end).rev().find(|&i| chars[i].is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::flow::FlowConfig;
    use crate::models::KnowledgeItem;

    fn item_with_content(content: &str) -> Content {
        Content::Generic(KnowledgeItem {
            content: Some(content.to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_content_short_circuits() {
        let config = SummaryFlowConfig::with_defaults(FlowConfig::default());
        let flow = SummaryFlow::new(&config).unwrap();
        let result = flow.run(&item_with_content("")).unwrap();
        assert_eq!(result, "No content available for summarization.");
    }

    #[test]
    fn test_by_section_rejected_at_construction_not_run() {
        let config = SummaryFlowConfig {
            chunk_strategy: ChunkingStrategy::BySection,
            ..SummaryFlowConfig::with_defaults(FlowConfig::default())
        };
        assert!(SummaryFlow::new(&config).is_err());
    }

    #[test]
    fn test_chunk_by_size_produces_multiple_chunks_for_long_input() {
        let content = "aaaa bbbb cccc dddd eeee ffff";
        assert_eq!(content.len(), 29);
        let chunks = chunk_by_size(content, 10);
        assert!(chunks.len() >= 2);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_chunk_by_size_single_chunk_when_shorter_than_chunk_size() {
        let content = "short text";
        let chunks = chunk_by_size(content, 2000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "short text");
    }

    #[test]
    fn test_chunk_by_size_trims_to_whitespace_boundary_past_midpoint() {
        let content = "0123456789 abcdefghij";
        let chunks = chunk_by_size(content, 20);
        assert_eq!(chunks[0], "0123456789");
    }

    #[test]
    fn test_missing_llm_block_is_hard_error() {
        let mut base = FlowConfig::default();
        base.prompt_templates.insert("summarize_chunk_template".to_string(), "{{ chunk_text }}".to_string());
        base.prompt_templates
            .insert("combine_summaries_template".to_string(), "{{ summaries }}".to_string());
        let config = SummaryFlowConfig {
            base,
            use_chunking: false,
            chunk_size: 2000,
            chunk_strategy: ChunkingStrategy::BySize,
            chunk_custom_strategy: None,
        };
        let flow = SummaryFlow::new(&config).unwrap();
        let err = flow.run(&item_with_content("hello")).unwrap_err();
        assert!(matches!(err, crate::Error::LlmBlockNotFound(_)));
    }
}
