//! Records that flow through a research session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============= Decomposition =============

/// Priority tier of a sub-query. Ordering is `High < Medium < Low` so a plain
/// sort puts high-priority work first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Lenient parse used on model output; unknown values fall back to medium.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "high" | "critical" | "1" => Priority::High,
            "low" | "3" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubQuery {
    pub id: String,
    pub query: String,
    pub rationale: String,
    pub priority: Priority,
}

impl SubQuery {
    pub fn new(query: impl Into<String>, rationale: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
            rationale: rationale.into(),
            priority,
        }
    }
}

// ============= Evidence Gathering =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Relevance in [0, 1].
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Sub-query that first surfaced this url.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_query_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    /// Whitespace-normalized extracted text.
    pub content: String,
    pub word_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub scraped_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_query_id: Option<String>,
}

impl ScrapedPage {
    pub fn is_successful(&self, min_words: usize) -> bool {
        self.error.is_none() && self.word_count >= min_words
    }
}

// ============= Indexing & Retrieval =============

/// Metadata attached to every chunk persisted in the evidence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_url: String,
    pub source_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_query_id: Option<String>,
    /// Window index within the source page.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunkRef {
    pub id: String,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
    /// Relevance in [0, 1].
    pub score: f32,
}

// ============= Report =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: usize,
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub title: String,
    #[serde(alias = "content")]
    pub body: String,
    #[serde(default)]
    pub citations: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub source_count: usize,
    pub sub_query_count: usize,
    pub generated_at: DateTime<Utc>,
    pub iteration_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub conclusions: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub metadata: ReportMetadata,
}

// ============= Review =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub approved: bool,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub change_requests: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HumanFeedback {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: String::new(),
            change_requests: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn reject(feedback: impl Into<String>, change_requests: Vec<String>) -> Self {
        Self {
            approved: false,
            feedback: feedback.into(),
            change_requests,
            timestamp: Utc::now(),
        }
    }

    /// Feedback text plus change requests, as injected into revision prompts.
    pub fn revision_text(&self) -> String {
        let mut text = self.feedback.trim().to_string();
        for request in &self.change_requests {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("- ");
            text.push_str(request.trim());
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_sort_order() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_priority_parse_lenient() {
        assert_eq!(Priority::parse_lenient("HIGH"), Priority::High);
        assert_eq!(Priority::parse_lenient(" low "), Priority::Low);
        assert_eq!(Priority::parse_lenient("urgent-ish"), Priority::Medium);
    }

    #[test]
    fn test_sub_query_ids_are_unique() {
        let a = SubQuery::new("a", "", Priority::High);
        let b = SubQuery::new("a", "", Priority::High);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_revision_text_includes_change_requests() {
        let feedback = HumanFeedback::reject(
            "add more detail on Y",
            vec!["cite primary sources".to_string()],
        );
        let text = feedback.revision_text();
        assert!(text.starts_with("add more detail on Y"));
        assert!(text.contains("- cite primary sources"));
    }

    #[test]
    fn test_section_accepts_content_alias() {
        let section: ReportSection =
            serde_json::from_str(r#"{"title":"T","content":"B","citations":[1]}"#).unwrap();
        assert_eq!(section.body, "B");
        assert_eq!(section.citations, vec![1]);
    }

    #[test]
    fn test_scraped_page_success_threshold() {
        let page = ScrapedPage {
            url: "https://a".into(),
            title: "A".into(),
            content: String::new(),
            word_count: 50,
            error: None,
            scraped_at: Utc::now(),
            sub_query_id: None,
        };
        assert!(page.is_successful(50));
        assert!(!page.is_successful(51));
    }
}
