//! LLM-based tagging: a bounded, normalized tag set generated for one
//! knowledge item and merged into its `tags`/`meta_info`.

use crate::config::LlmTaggerConfig;
use crate::llm::LlmBlock;
use crate::models::Content;

const DEFAULT_PROMPT_TEMPLATE: &str = "You are a financial research analyst tagging content for a quantitative \
finance knowledge base. Given the following content, generate up to {max_tags} relevant tags.

Consider tags across these categories where applicable:
- Market types (e.g. equities, fixed income, fx, crypto, derivatives)
- Methods (e.g. backtesting, factor models, machine learning, time series)
- Applications (e.g. risk management, portfolio construction, alpha generation)
- Data types (e.g. tick data, fundamental data, alternative data)
- Techniques (e.g. regression, monte carlo, optimization)

Return ONLY a JSON array of lowercase string tags, with no other text.

Content:
{content}";

/// An LLM-driven enricher: produces a bounded set of normalized string tags
/// for a knowledge item.
pub struct LlmTagger {
    config: LlmTaggerConfig,
    block: LlmBlock,
}

impl LlmTagger {
    /// Builds an [`LlmTagger`] from its config.
    #[must_use]
    pub fn new(config: LlmTaggerConfig) -> Self {
        let block = LlmBlock::new(config.llm.clone());
        Self { config, block }
    }

    /// Generates tags for `item`'s embedding text, merges them into
    /// `item.tags`, and records a `{tagger, model_used, tags_generated}`
    /// enrichment entry in `item.meta_info`.
    ///
    /// A failed or empty LLM response degrades to no tags added — this is a
    /// soft-fail enrichment step, never a hard error.
    pub fn tag(&self, item: &mut Content) {
        let content = item.get_text_for_embedding();
        let prompt = self.build_prompt(&content);

        let Some(response) = self.block.generate_text(&prompt, None, Default::default()) else {
            return;
        };

        let tags = parse_tags(&response);
        let tags = normalize_and_truncate(&tags, self.config.max_tags);

        for tag in &tags {
            if !item.tags_mut().iter().any(|existing| existing == tag) {
                item.tags_mut().push(tag.clone());
            }
        }

        item.meta_info_mut().insert(
            "tagger".to_string(),
            serde_json::Value::String("llm_tagger".to_string()),
        );
        item.meta_info_mut().insert(
            "model_used".to_string(),
            serde_json::Value::String(self.config.llm.model.clone()),
        );
        item.meta_info_mut().insert(
            "tags_generated".to_string(),
            serde_json::Value::Number(tags.len().into()),
        );
    }

    fn build_prompt(&self, content: &str) -> String {
        let template = self.config.custom_prompt.as_deref().unwrap_or(DEFAULT_PROMPT_TEMPLATE);
        let mut prompt = template
            .replace("{content}", content)
            .replace("{max_tags}", &self.config.max_tags.to_string());
        if let Some(instructions) = &self.config.custom_instructions {
            prompt.push_str("\n\nAdditional Instructions:\n");
            prompt.push_str(instructions);
        }
        prompt
    }
}

/// Parses `response` as a JSON array of tag strings, finding the first `[`
/// and last `]` and slicing between them before parsing (a whole-response
/// parse would fail whenever the model wraps the array in prose). Falls
/// back to extracting quoted items, then comma-separated items, from the
/// raw text.
fn parse_tags(response: &str) -> Vec<String> {
    if let Some(start) = response.find('[') {
        if let Some(end) = response.rfind(']') {
            if end > start {
                if let Ok(serde_json::Value::Array(values)) =
                    serde_json::from_str::<serde_json::Value>(&response[start..=end])
                {
                    return values
                        .into_iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                }
            }
        }
    }
    extract_tags_from_text(response)
}

/// Fallback extraction when the response cannot be parsed as a JSON array:
/// first tries quoted (`"…"`) substrings; if none are found, falls back to
/// the comma-separated items of the first non-comment line containing a
/// comma, requiring at least two items.
fn extract_tags_from_text(text: &str) -> Vec<String> {
    let quoted = extract_quoted(text);
    if !quoted.is_empty() {
        return quoted;
    }

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if !line.contains(',') {
            continue;
        }
        let items: Vec<String> = line.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if items.len() >= 2 {
            return items;
        }
    }
    Vec::new()
}

fn extract_quoted(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '"' {
            continue;
        }
        let rest = &text[start + 1..];
        if let Some(end) = rest.find('"') {
            tags.push(rest[..end].to_string());
            // Skip past the consumed characters on the next outer iteration.
            let skip_to = start + 1 + end;
            while let Some(&(idx, _)) = chars.peek() {
                if idx > skip_to {
                    break;
                }
                chars.next();
            }
        }
    }
    tags
}

/// Trims, lowercases, drops empty and single-character tags, dedups while
/// preserving order, then truncates to `max_tags`.
fn normalize_and_truncate(tags: &[String], max_tags: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::new();
    for tag in tags {
        let trimmed = tag.trim().to_lowercase();
        if trimmed.chars().count() <= 1 {
            continue;
        }
        if seen.insert(trimmed.clone()) {
            normalized.push(trimmed);
        }
        if normalized.len() >= max_tags {
            break;
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KnowledgeItem;

    #[test]
    fn test_parse_tags_direct_json_array() {
        let tags = parse_tags(r#"["equities", "risk management"]"#);
        assert_eq!(tags, vec!["equities", "risk management"]);
    }

    #[test]
    fn test_parse_tags_array_wrapped_in_prose() {
        let tags = parse_tags("Here are the tags: [\"fx\", \"derivatives\"] based on the content.");
        assert_eq!(tags, vec!["fx", "derivatives"]);
    }

    #[test]
    fn test_parse_tags_falls_back_to_quoted_extraction() {
        let tags = parse_tags("The tags are \"equities\" and \"fx\".");
        assert_eq!(tags, vec!["equities", "fx"]);
    }

    #[test]
    fn test_parse_tags_falls_back_to_comma_separated_line() {
        let tags = parse_tags("equities, fixed income, crypto");
        assert_eq!(tags, vec!["equities", "fixed income", "crypto"]);
    }

    #[test]
    fn test_parse_tags_skips_comment_lines_for_comma_fallback() {
        let tags = parse_tags("# a comment, with a comma\nequities, fx");
        assert_eq!(tags, vec!["equities", "fx"]);
    }

    #[test]
    fn test_parse_tags_garbage_is_empty() {
        assert!(parse_tags("no structure here at all").is_empty());
    }

    #[test]
    fn test_normalize_and_truncate_drops_single_char_and_dedups() {
        let tags = vec![
            "Equities".to_string(),
            "a".to_string(),
            "equities".to_string(),
            "  FX  ".to_string(),
        ];
        let normalized = normalize_and_truncate(&tags, 10);
        assert_eq!(normalized, vec!["equities", "fx"]);
    }

    #[test]
    fn test_normalize_and_truncate_respects_max_tags() {
        let tags = vec!["a1".to_string(), "b2".to_string(), "c3".to_string()];
        let normalized = normalize_and_truncate(&tags, 2);
        assert_eq!(normalized.len(), 2);
    }

    #[test]
    fn test_build_prompt_substitutes_content_and_max_tags() {
        let tagger = LlmTagger::new(LlmTaggerConfig::default());
        let prompt = tagger.build_prompt("Some research content.");
        assert!(prompt.contains("Some research content."));
        assert!(prompt.contains("10"));
    }

    #[test]
    fn test_build_prompt_uses_custom_prompt_when_set() {
        let config = LlmTaggerConfig {
            custom_prompt: Some("Tag this: {content} (max {max_tags})".to_string()),
            ..Default::default()
        };
        let tagger = LlmTagger::new(config);
        let prompt = tagger.build_prompt("X");
        assert_eq!(prompt, "Tag this: X (max 10)");
    }

    #[test]
    fn test_tag_degrades_softly_when_llm_unreachable() {
        let config = LlmTaggerConfig {
            llm: crate::config::LlmConfig {
                base_url: Some("http://127.0.0.1:1".to_string()),
                retry_attempts: 0,
                timeout: 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let tagger = LlmTagger::new(config);
        let mut item = Content::Generic(KnowledgeItem {
            title: "T".to_string(),
            ..Default::default()
        });
        tagger.tag(&mut item);
        assert!(item.tags_mut().is_empty());
    }
}
