//! `Paper` content subtype.

use crate::models::knowledge::{BaseContent, KnowledgeItem};
use serde::{Deserialize, Serialize};

/// An academic paper, e.g. from arXiv.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Paper {
    /// Base knowledge-item fields (title, content, tags, meta_info, …),
    /// flattened into the same JSON object on disk.
    #[serde(flatten)]
    pub base: KnowledgeItem,
    /// arXiv identifier, when the paper came from arXiv.
    #[serde(default)]
    pub arxiv_id: Option<String>,
    /// Direct URL to the PDF, used by `Storage::process_knowledge`'s
    /// download step.
    #[serde(default)]
    pub pdf_url: Option<String>,
    /// Publication date, ISO-8601.
    #[serde(default)]
    pub published_date: Option<String>,
    /// Primary subject category (e.g. `"q-fin.TR"`).
    #[serde(default)]
    pub primary_category: Option<String>,
}

impl Paper {
    /// Returns the full extracted text body. Named separately from
    /// `base.content` for parity with the original's `full_text` alias,
    /// but backed by the same single field rather than a second
    /// independently-settable one.
    #[must_use]
    pub fn full_text(&self) -> Option<&str> {
        self.base.content.as_deref()
    }
}

impl BaseContent for Paper {
    fn get_primary_id(&self) -> String {
        self.arxiv_id
            .clone()
            .unwrap_or_else(|| self.base.get_primary_id())
    }

    fn get_text_for_embedding(&self) -> String {
        self.base.get_text_for_embedding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_id_prefers_arxiv_id() {
        let paper = Paper {
            arxiv_id: Some("2401.0001".to_string()),
            base: KnowledgeItem {
                title: "T".to_string(),
                source: "arxiv".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(paper.get_primary_id(), "2401.0001");
    }

    #[test]
    fn test_primary_id_falls_back_without_arxiv_id() {
        let paper = Paper {
            arxiv_id: None,
            base: KnowledgeItem {
                title: "T".to_string(),
                source: "arxiv".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(paper.get_primary_id(), paper.base.get_primary_id());
    }

    #[test]
    fn test_json_round_trip() {
        let paper = Paper {
            arxiv_id: Some("2401.0001".to_string()),
            pdf_url: Some("https://arxiv.org/pdf/2401.0001".to_string()),
            base: KnowledgeItem {
                title: "T".to_string(),
                content: Some("body text".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&paper).unwrap();
        let round_tripped: Paper = serde_json::from_str(&json).unwrap();
        assert_eq!(paper, round_tripped);
        assert_eq!(round_tripped.full_text(), Some("body text"));
    }
}
