//! `KnowledgeItem` base entity.

use crate::models::paper::Paper;
use crate::models::search::SearchContent;
use serde::{Deserialize, Serialize};

/// Behavior every content subtype (generic, [`Paper`], [`SearchContent`])
/// implements: a stable identity and a projection used for embeddings.
pub trait BaseContent {
    /// The primary identifier, stable across runs. Duplicate IDs in storage
    /// are considered the same item.
    fn get_primary_id(&self) -> String;
    /// The text fed to an embedding model for this item.
    fn get_text_for_embedding(&self) -> String;
}

/// The generic knowledge entity: title/abstract/content plus open
/// `meta_info`. Serves as both the base fields shared by every subtype and
/// a standalone content type in its own right (`content_type = "generic"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeItem {
    /// Title of the item.
    #[serde(default)]
    pub title: String,
    /// Abstract or summary text, if any.
    #[serde(default)]
    pub abstract_text: Option<String>,
    /// The extracted full text body.
    #[serde(default)]
    pub content: Option<String>,
    /// Ordered author list.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Category tags (e.g. subject classifications).
    #[serde(default)]
    pub categories: Vec<String>,
    /// Free-form enrichment tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source system tag (e.g. `"arxiv"`, `"search"`, `"manual"`).
    #[serde(default)]
    pub source: String,
    /// Creation timestamp, ISO-8601.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last-update timestamp, ISO-8601.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Open-ended metadata written by downstream enrichers (flows, taggers).
    /// Kept as an opaque JSON object rather than a typed struct, since the
    /// set of keys is open by design (see `SPEC_FULL.md` §9).
    #[serde(default)]
    pub meta_info: serde_json::Map<String, serde_json::Value>,
}

impl Default for KnowledgeItem {
    fn default() -> Self {
        Self {
            title: String::new(),
            abstract_text: None,
            content: None,
            authors: Vec::new(),
            categories: Vec::new(),
            tags: Vec::new(),
            source: String::new(),
            created_at: None,
            updated_at: None,
            meta_info: serde_json::Map::new(),
        }
    }
}

impl BaseContent for KnowledgeItem {
    fn get_primary_id(&self) -> String {
        stable_fallback_id(&self.source, &self.title)
    }

    fn get_text_for_embedding(&self) -> String {
        format!(
            "{}{}",
            self.title,
            self.abstract_text.as_deref().unwrap_or_default()
        )
    }
}

/// Stable hash-based identity used as the default `get_primary_id` fallback
/// for any subtype (or the generic item) that has no natural identifier of
/// its own.
#[must_use]
pub fn stable_fallback_id(source: &str, title: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    source.hash(&mut hasher);
    title.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// A content item tagged by its concrete subtype, used wherever storage or
/// a flow needs to hold "some `KnowledgeItem`-family value" without knowing
/// which subtype ahead of time. Deserializes into the correct subtype based
/// on the stored `content_type` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    /// A plain [`KnowledgeItem`] with no subtype-specific fields.
    Generic(KnowledgeItem),
    /// An academic paper.
    Paper(Paper),
    /// A search-engine result snippet.
    Search(SearchContent),
}

impl Content {
    /// Dispatches to the wrapped subtype's primary ID.
    #[must_use]
    pub fn get_primary_id(&self) -> String {
        match self {
            Self::Generic(item) => item.get_primary_id(),
            Self::Paper(paper) => paper.get_primary_id(),
            Self::Search(search) => search.get_primary_id(),
        }
    }

    /// Dispatches to the wrapped subtype's embedding text.
    #[must_use]
    pub fn get_text_for_embedding(&self) -> String {
        match self {
            Self::Generic(item) => item.get_text_for_embedding(),
            Self::Paper(paper) => paper.get_text_for_embedding(),
            Self::Search(search) => search.get_text_for_embedding(),
        }
    }

    /// The `content_type` discriminator string as it appears on disk.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Generic(_) => "generic",
            Self::Paper(_) => "paper",
            Self::Search(_) => "search",
        }
    }

    /// Borrows the base-level `title`/`content` fields regardless of subtype,
    /// for callers (e.g. flows) that only need the generic surface.
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Generic(item) => &item.title,
            Self::Paper(paper) => &paper.base.title,
            Self::Search(search) => &search.title,
        }
    }

    /// Borrows the content body, if any, regardless of subtype.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Generic(item) => item.content.as_deref(),
            Self::Paper(paper) => paper.base.content.as_deref(),
            Self::Search(_) => None,
        }
    }

    /// Mutable access to the base `meta_info` map, regardless of subtype.
    pub fn meta_info_mut(&mut self) -> &mut serde_json::Map<String, serde_json::Value> {
        match self {
            Self::Generic(item) => &mut item.meta_info,
            Self::Paper(paper) => &mut paper.base.meta_info,
            Self::Search(search) => &mut search.meta_info,
        }
    }

    /// Mutable access to the base `tags` list, regardless of subtype.
    pub fn tags_mut(&mut self) -> &mut Vec<String> {
        match self {
            Self::Generic(item) => &mut item.tags,
            Self::Paper(paper) => &mut paper.base.tags,
            Self::Search(search) => &mut search.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_knowledge_item_round_trip() {
        let mut item = KnowledgeItem {
            title: "T".to_string(),
            source: "manual".to_string(),
            ..Default::default()
        };
        item.tags.push("finance".to_string());
        item.meta_info
            .insert("k".to_string(), serde_json::json!(1));

        let content = Content::Generic(item.clone());
        let json = serde_json::to_string(&content).unwrap();
        let round_tripped: Content = serde_json::from_str(&json).unwrap();

        assert_eq!(content, round_tripped);
        assert_eq!(round_tripped.content_type(), "generic");
    }

    #[test]
    fn test_stable_fallback_id_is_deterministic() {
        let a = stable_fallback_id("arxiv", "Some Title");
        let b = stable_fallback_id("arxiv", "Some Title");
        let c = stable_fallback_id("arxiv", "Different Title");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
