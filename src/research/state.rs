//! Session state and its per-field merge policy.
//!
//! Every stage returns a [`StateUpdate`] holding only the fields it touched.
//! [`ResearchState::apply`] folds the update in, choosing the merge behavior
//! from [`StateField::policy`]. The policy table is the single place that
//! decides whether a field is replaced, appended to, or merged as a set.

use super::models::{
    HumanFeedback, Report, RetrievedChunk, ScrapedPage, SearchResult, StoredChunkRef, SubQuery,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

// ============= Stages =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Decompose,
    Search,
    Scrape,
    Index,
    Retrieve,
    Synthesize,
    Review,
    Done,
    Error,
}

impl Stage {
    /// The stage that follows this one in a straight pass.
    ///
    /// `Review` maps to itself: leaving review is decided by routing.
    pub fn successor(self) -> Stage {
        match self {
            Stage::Decompose => Stage::Search,
            Stage::Search => Stage::Scrape,
            Stage::Scrape => Stage::Index,
            Stage::Index => Stage::Retrieve,
            Stage::Retrieve => Stage::Synthesize,
            Stage::Synthesize => Stage::Review,
            Stage::Review => Stage::Review,
            Stage::Done => Stage::Done,
            Stage::Error => Stage::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Decompose => "decompose",
            Stage::Search => "search",
            Stage::Scrape => "scrape",
            Stage::Index => "index",
            Stage::Retrieve => "retrieve",
            Stage::Synthesize => "synthesize",
            Stage::Review => "review",
            Stage::Done => "done",
            Stage::Error => "error",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============= Merge Policy =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// New value wins outright.
    Replace,
    /// New elements are concatenated to the existing list.
    Append,
    /// New elements are merged into the existing set by identity.
    AppendDedup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Stage,
    SubQueries,
    SearchResults,
    ScrapedPages,
    StoredChunks,
    RetrievedChunks,
    DraftReport,
    LastDraft,
    FinalReport,
    Feedback,
    Iteration,
    Errors,
}

impl StateField {
    pub const ALL: [StateField; 12] = [
        StateField::Stage,
        StateField::SubQueries,
        StateField::SearchResults,
        StateField::ScrapedPages,
        StateField::StoredChunks,
        StateField::RetrievedChunks,
        StateField::DraftReport,
        StateField::LastDraft,
        StateField::FinalReport,
        StateField::Feedback,
        StateField::Iteration,
        StateField::Errors,
    ];

    pub const fn policy(self) -> MergePolicy {
        match self {
            StateField::SearchResults | StateField::ScrapedPages => MergePolicy::Append,
            StateField::StoredChunks | StateField::Errors => MergePolicy::AppendDedup,
            StateField::Stage
            | StateField::SubQueries
            | StateField::RetrievedChunks
            | StateField::DraftReport
            | StateField::LastDraft
            | StateField::FinalReport
            | StateField::Feedback
            | StateField::Iteration => MergePolicy::Replace,
        }
    }
}

/// Identity used by [`MergePolicy::AppendDedup`].
pub trait MergeKey {
    fn merge_key(&self) -> &str;
}

impl MergeKey for SubQuery {
    fn merge_key(&self) -> &str {
        &self.id
    }
}

impl MergeKey for SearchResult {
    fn merge_key(&self) -> &str {
        &self.url
    }
}

impl MergeKey for ScrapedPage {
    fn merge_key(&self) -> &str {
        &self.url
    }
}

impl MergeKey for StoredChunkRef {
    fn merge_key(&self) -> &str {
        &self.id
    }
}

impl MergeKey for RetrievedChunk {
    fn merge_key(&self) -> &str {
        &self.text
    }
}

impl MergeKey for String {
    fn merge_key(&self) -> &str {
        self
    }
}

fn merge_list<T: MergeKey>(current: &mut Vec<T>, incoming: Vec<T>, policy: MergePolicy) {
    match policy {
        MergePolicy::Replace => *current = incoming,
        MergePolicy::Append => current.extend(incoming),
        MergePolicy::AppendDedup => {
            let mut seen: HashSet<String> =
                current.iter().map(|item| item.merge_key().to_string()).collect();
            for item in incoming {
                if seen.insert(item.merge_key().to_string()) {
                    current.push(item);
                }
            }
        }
    }
}

fn merge_value<T>(current: &mut T, incoming: T, policy: MergePolicy) {
    debug_assert_eq!(policy, MergePolicy::Replace, "scalar fields only replace");
    *current = incoming;
}

// ============= State =============

/// The single mutable record threaded through every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    pub session_id: String,
    pub question: String,
    pub stage: Stage,
    pub sub_queries: Vec<SubQuery>,
    pub search_results: Vec<SearchResult>,
    pub scraped_pages: Vec<ScrapedPage>,
    pub stored_chunks: Vec<StoredChunkRef>,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub draft_report: Option<Report>,
    /// Draft cleared by the most recent revision, kept for best-effort output.
    pub last_draft: Option<Report>,
    pub final_report: Option<Report>,
    pub feedback: Option<HumanFeedback>,
    pub iteration: u32,
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResearchState {
    pub fn new(question: impl Into<String>) -> Self {
        Self::with_session_id(Uuid::new_v4().to_string(), question)
    }

    pub fn with_session_id(session_id: impl Into<String>, question: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            question: question.into(),
            stage: Stage::Decompose,
            sub_queries: Vec::new(),
            search_results: Vec::new(),
            scraped_pages: Vec::new(),
            stored_chunks: Vec::new(),
            retrieved_chunks: Vec::new(),
            draft_report: None,
            last_draft: None,
            final_report: None,
            feedback: None,
            iteration: 0,
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a partial update into the state using each field's policy.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(stage) = update.stage {
            merge_value(&mut self.stage, stage, StateField::Stage.policy());
        }
        if let Some(sub_queries) = update.sub_queries {
            merge_list(&mut self.sub_queries, sub_queries, StateField::SubQueries.policy());
        }
        if let Some(results) = update.search_results {
            merge_list(&mut self.search_results, results, StateField::SearchResults.policy());
        }
        if let Some(pages) = update.scraped_pages {
            merge_list(&mut self.scraped_pages, pages, StateField::ScrapedPages.policy());
        }
        if let Some(chunks) = update.stored_chunks {
            merge_list(&mut self.stored_chunks, chunks, StateField::StoredChunks.policy());
        }
        if let Some(chunks) = update.retrieved_chunks {
            merge_list(
                &mut self.retrieved_chunks,
                chunks,
                StateField::RetrievedChunks.policy(),
            );
        }
        if let Some(report) = update.draft_report {
            merge_value(&mut self.draft_report, report, StateField::DraftReport.policy());
        }
        if let Some(report) = update.last_draft {
            merge_value(&mut self.last_draft, report, StateField::LastDraft.policy());
        }
        if let Some(report) = update.final_report {
            merge_value(&mut self.final_report, report, StateField::FinalReport.policy());
        }
        if let Some(feedback) = update.feedback {
            merge_value(&mut self.feedback, feedback, StateField::Feedback.policy());
        }
        if let Some(iteration) = update.iteration {
            merge_value(&mut self.iteration, iteration, StateField::Iteration.policy());
        }
        if !update.errors.is_empty() {
            merge_list(&mut self.errors, update.errors, StateField::Errors.policy());
        }
        self.updated_at = Utc::now();
    }

    /// Feedback from a rejected review, if this is a revision pass.
    pub fn revision_feedback(&self) -> Option<&HumanFeedback> {
        self.feedback.as_ref().filter(|f| !f.approved)
    }

    pub fn known_search_urls(&self) -> HashSet<&str> {
        self.search_results.iter().map(|r| r.url.as_str()).collect()
    }

    pub fn scraped_urls(&self) -> HashSet<&str> {
        self.scraped_pages.iter().map(|p| p.url.as_str()).collect()
    }

    pub fn indexed_urls(&self) -> HashSet<&str> {
        self.stored_chunks
            .iter()
            .map(|c| c.metadata.source_url.as_str())
            .collect()
    }

    /// Most recent synthesized report, whether current or cleared by revision.
    pub fn best_draft(&self) -> Option<&Report> {
        self.draft_report.as_ref().or(self.last_draft.as_ref())
    }

    /// Explicitly drop stored-chunk identifiers, the only way the set shrinks.
    pub fn clear_stored_chunks(&mut self) {
        self.stored_chunks.clear();
        self.updated_at = Utc::now();
    }
}

/// Partial state produced by one stage. `None` leaves a field untouched.
///
/// Nullable fields use `Option<Option<T>>` so a stage can replace a value with
/// nothing (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub stage: Option<Stage>,
    pub sub_queries: Option<Vec<SubQuery>>,
    pub search_results: Option<Vec<SearchResult>>,
    pub scraped_pages: Option<Vec<ScrapedPage>>,
    pub stored_chunks: Option<Vec<StoredChunkRef>>,
    pub retrieved_chunks: Option<Vec<RetrievedChunk>>,
    pub draft_report: Option<Option<Report>>,
    pub last_draft: Option<Option<Report>>,
    pub final_report: Option<Option<Report>>,
    pub feedback: Option<Option<HumanFeedback>>,
    pub iteration: Option<u32>,
    pub errors: Vec<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::{ChunkMetadata, Priority, ReportMetadata};

    fn result(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: url.to_string(),
            snippet: String::new(),
            score: 0.5,
            published_date: None,
            sub_query_id: None,
        }
    }

    fn page(url: &str) -> ScrapedPage {
        ScrapedPage {
            url: url.to_string(),
            title: url.to_string(),
            content: "text".to_string(),
            word_count: 100,
            error: None,
            scraped_at: Utc::now(),
            sub_query_id: None,
        }
    }

    fn chunk_ref(id: &str) -> StoredChunkRef {
        StoredChunkRef {
            id: id.to_string(),
            metadata: ChunkMetadata {
                source_url: "https://a".to_string(),
                source_title: "A".to_string(),
                sub_query_id: None,
                position: 0,
            },
        }
    }

    fn retrieved(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            metadata: chunk_ref("x").metadata,
            score: 0.9,
        }
    }

    fn report(title: &str) -> Report {
        Report {
            title: title.to_string(),
            executive_summary: String::new(),
            sections: Vec::new(),
            conclusions: String::new(),
            citations: Vec::new(),
            metadata: ReportMetadata {
                source_count: 0,
                sub_query_count: 0,
                generated_at: Utc::now(),
                iteration_count: 1,
            },
        }
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = ResearchState::new("q");
        assert_eq!(state.stage, Stage::Decompose);
        assert_eq!(state.iteration, 0);
        assert!(state.search_results.is_empty());
        assert!(state.errors.is_empty());
        assert!(state.draft_report.is_none());
    }

    #[test]
    fn test_policy_table() {
        let appended: Vec<_> = StateField::ALL
            .iter()
            .filter(|f| f.policy() == MergePolicy::Append)
            .collect();
        assert_eq!(appended, vec![&StateField::SearchResults, &StateField::ScrapedPages]);
        assert_eq!(StateField::StoredChunks.policy(), MergePolicy::AppendDedup);
        assert_eq!(StateField::Errors.policy(), MergePolicy::AppendDedup);
    }

    #[test]
    fn test_stage_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate::new().with_stage(Stage::Scrape));
        state.apply(StateUpdate::new().with_stage(Stage::Index));
        assert_eq!(state.stage, Stage::Index);
    }

    #[test]
    fn test_sub_queries_field_replaces() {
        let mut state = ResearchState::new("q");
        let first = vec![
            SubQuery::new("a", "", Priority::High),
            SubQuery::new("b", "", Priority::Low),
        ];
        state.apply(StateUpdate {
            sub_queries: Some(first),
            ..Default::default()
        });
        let second = vec![SubQuery::new("c", "", Priority::Medium)];
        state.apply(StateUpdate {
            sub_queries: Some(second.clone()),
            ..Default::default()
        });
        assert_eq!(state.sub_queries, second);
    }

    #[test]
    fn test_search_results_field_appends() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            search_results: Some(vec![result("https://a")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            search_results: Some(vec![result("https://b")]),
            ..Default::default()
        });
        let urls: Vec<_> = state.search_results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b"]);
    }

    #[test]
    fn test_scraped_pages_field_appends() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            scraped_pages: Some(vec![page("https://a")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            scraped_pages: Some(vec![page("https://b"), page("https://c")]),
            ..Default::default()
        });
        assert_eq!(state.scraped_pages.len(), 3);
        assert!(state.scraped_urls().contains("https://a"));
    }

    #[test]
    fn test_stored_chunks_field_dedups_by_id() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            stored_chunks: Some(vec![chunk_ref("1"), chunk_ref("2")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            stored_chunks: Some(vec![chunk_ref("2"), chunk_ref("3")]),
            ..Default::default()
        });
        let ids: Vec<_> = state.stored_chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_stored_chunks_survive_empty_update() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            stored_chunks: Some(vec![chunk_ref("1")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            stored_chunks: Some(Vec::new()),
            ..Default::default()
        });
        assert_eq!(state.stored_chunks.len(), 1);
        state.clear_stored_chunks();
        assert!(state.stored_chunks.is_empty());
    }

    #[test]
    fn test_retrieved_chunks_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            retrieved_chunks: Some(vec![retrieved("old one"), retrieved("old two")]),
            ..Default::default()
        });
        state.apply(StateUpdate {
            retrieved_chunks: Some(vec![retrieved("new")]),
            ..Default::default()
        });
        assert_eq!(state.retrieved_chunks.len(), 1);
        assert_eq!(state.retrieved_chunks[0].text, "new");

        state.apply(StateUpdate {
            retrieved_chunks: Some(Vec::new()),
            ..Default::default()
        });
        assert!(state.retrieved_chunks.is_empty());
    }

    #[test]
    fn test_draft_report_field_replaces_and_clears() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            draft_report: Some(Some(report("first"))),
            ..Default::default()
        });
        state.apply(StateUpdate {
            draft_report: Some(Some(report("second"))),
            ..Default::default()
        });
        assert_eq!(state.draft_report.as_ref().map(|r| r.title.as_str()), Some("second"));

        state.apply(StateUpdate {
            draft_report: Some(None),
            ..Default::default()
        });
        assert!(state.draft_report.is_none());

        // None leaves it untouched
        state.apply(StateUpdate::new());
        assert!(state.draft_report.is_none());
    }

    #[test]
    fn test_last_draft_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            last_draft: Some(Some(report("kept"))),
            ..Default::default()
        });
        assert_eq!(state.best_draft().map(|r| r.title.as_str()), Some("kept"));
        state.apply(StateUpdate {
            draft_report: Some(Some(report("current"))),
            ..Default::default()
        });
        assert_eq!(state.best_draft().map(|r| r.title.as_str()), Some("current"));
    }

    #[test]
    fn test_final_report_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            final_report: Some(Some(report("final"))),
            ..Default::default()
        });
        assert_eq!(state.final_report.as_ref().map(|r| r.title.as_str()), Some("final"));
    }

    #[test]
    fn test_feedback_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            feedback: Some(Some(HumanFeedback::reject("more on Y", vec![]))),
            ..Default::default()
        });
        assert!(state.revision_feedback().is_some());
        state.apply(StateUpdate {
            feedback: Some(Some(HumanFeedback::approve())),
            ..Default::default()
        });
        assert!(state.feedback.as_ref().is_some_and(|f| f.approved));
        assert!(state.revision_feedback().is_none());
    }

    #[test]
    fn test_iteration_field_replaces() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            iteration: Some(1),
            ..Default::default()
        });
        state.apply(StateUpdate {
            iteration: Some(2),
            ..Default::default()
        });
        assert_eq!(state.iteration, 2);
    }

    #[test]
    fn test_errors_field_appends_deduplicated() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate::new().with_errors(vec!["a".into(), "b".into()]));
        state.apply(StateUpdate::new().with_errors(vec!["b".into(), "c".into()]));
        assert_eq!(state.errors, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_stage_successors_form_single_pass() {
        let mut stage = Stage::Decompose;
        let mut visited = vec![stage];
        while stage != Stage::Review {
            stage = stage.successor();
            visited.push(stage);
        }
        assert_eq!(visited.len(), 7);
        assert_eq!(Stage::Review.successor(), Stage::Review);
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Error.is_terminal());
        assert!(!Stage::Review.is_terminal());
    }

    #[test]
    fn test_state_roundtrips_through_json() {
        let mut state = ResearchState::new("q");
        state.apply(StateUpdate {
            search_results: Some(vec![result("https://a")]),
            draft_report: Some(Some(report("d"))),
            iteration: Some(1),
            ..Default::default()
        });
        let json = serde_json::to_string(&state).unwrap();
        let restored: ResearchState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }
}
