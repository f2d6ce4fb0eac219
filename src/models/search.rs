//! `SearchContent` subtype: a search-engine result snippet.

use crate::models::knowledge::{BaseContent, KnowledgeItem};
use serde::{Deserialize, Serialize};

/// Content sourced from a search-engine result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchContent {
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Result URL — also the primary identifier.
    #[serde(default)]
    pub url: String,
    /// Result snippet text.
    #[serde(default)]
    pub snippet: String,
    /// Source system tag, defaults to `"search"`.
    #[serde(default = "default_source")]
    pub source: String,
    /// The query that produced this result, if tracked.
    #[serde(default)]
    pub query: Option<String>,
    /// Free-form enrichment tags, kept for parity with [`KnowledgeItem`].
    #[serde(default)]
    pub tags: Vec<String>,
    /// Open-ended metadata.
    #[serde(default)]
    pub meta_info: serde_json::Map<String, serde_json::Value>,
}

fn default_source() -> String {
    "search".to_string()
}

impl BaseContent for SearchContent {
    fn get_primary_id(&self) -> String {
        self.url.clone()
    }

    /// `title + snippet`, concatenated with no separator, matching the
    /// original's `f"{self.title}{self.snippet}"` literally.
    fn get_text_for_embedding(&self) -> String {
        format!("{}{}", self.title, self.snippet)
    }
}

impl From<&SearchContent> for KnowledgeItem {
    fn from(search: &SearchContent) -> Self {
        Self {
            title: search.title.clone(),
            source: search.source.clone(),
            tags: search.tags.clone(),
            meta_info: search.meta_info.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_id_is_url() {
        let search = SearchContent {
            url: "https://example.com/a".to_string(),
            ..Default::default()
        };
        assert_eq!(search.get_primary_id(), "https://example.com/a");
    }

    #[test]
    fn test_embedding_text_concatenates_title_and_snippet() {
        let search = SearchContent {
            title: "Title".to_string(),
            snippet: "Snippet".to_string(),
            ..Default::default()
        };
        assert_eq!(search.get_text_for_embedding(), "TitleSnippet");
    }

    #[test]
    fn test_json_round_trip() {
        let search = SearchContent {
            title: "T".to_string(),
            url: "https://example.com".to_string(),
            snippet: "S".to_string(),
            query: Some("q".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&search).unwrap();
        let round_tripped: SearchContent = serde_json::from_str(&json).unwrap();
        assert_eq!(search, round_tripped);
    }
}
