//! Content model: `KnowledgeItem` and its subtypes.

pub mod knowledge;
pub mod paper;
pub mod search;

pub use knowledge::{BaseContent, Content, KnowledgeItem};
pub use paper::Paper;
pub use search::SearchContent;
