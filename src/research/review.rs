//! Human review: the decision model and the channel that collects it.
//!
//! Review is the only place the pipeline waits on a person. The engine
//! checkpoints state before handing the draft to a [`ReviewChannel`] (or to
//! a later `resume` call), then folds the decision back in.

use super::models::{HumanFeedback, Report};
use super::state::{ResearchState, StateUpdate};
use crate::types::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    Approve,
    Reject {
        feedback: String,
        change_requests: Vec<String>,
    },
    /// End the session without a final report.
    Abort,
}

impl ReviewDecision {
    pub fn reject(feedback: impl Into<String>) -> Self {
        ReviewDecision::Reject {
            feedback: feedback.into(),
            change_requests: Vec::new(),
        }
    }

    /// The feedback record this decision produces. Abort produces none.
    pub fn to_feedback(&self) -> Option<HumanFeedback> {
        match self {
            ReviewDecision::Approve => Some(HumanFeedback::approve()),
            ReviewDecision::Reject {
                feedback,
                change_requests,
            } => Some(HumanFeedback::reject(feedback.clone(), change_requests.clone())),
            ReviewDecision::Abort => None,
        }
    }
}

/// Something that can show a draft to a person and return their decision.
pub trait ReviewChannel {
    fn review(&mut self, session_id: &str, draft: &Report) -> Result<ReviewDecision>;
}

/// Merge a review decision into state.
pub fn record_decision(decision: &ReviewDecision) -> StateUpdate {
    let mut update = StateUpdate::new();
    if let Some(feedback) = decision.to_feedback() {
        update.feedback = Some(Some(feedback));
    }
    update
}

/// Reset the per-pass outputs before another decomposition pass.
///
/// Retrieval and the draft are cleared. The draft is kept aside as
/// `last_draft`. Search results, scraped pages and stored chunks stay.
pub fn revision_update(state: &ResearchState) -> StateUpdate {
    let mut update = StateUpdate::new();
    update.retrieved_chunks = Some(Vec::new());
    update.draft_report = Some(None);
    if let Some(draft) = &state.draft_report {
        update.last_draft = Some(Some(draft.clone()));
    }
    update
}

/// Promote the current draft to the final report.
pub fn finalize_update(state: &ResearchState) -> StateUpdate {
    let mut update = StateUpdate::new();
    update.final_report = Some(state.best_draft().cloned());
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::{ReportMetadata, RetrievedChunk, ChunkMetadata};
    use chrono::Utc;

    fn report(title: &str) -> Report {
        Report {
            title: title.to_string(),
            executive_summary: "summary".into(),
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
    fn test_decision_to_feedback() {
        assert!(ReviewDecision::Approve.to_feedback().unwrap().approved);
        let rejected = ReviewDecision::Reject {
            feedback: "more".into(),
            change_requests: vec!["cite".into()],
        }
        .to_feedback()
        .unwrap();
        assert!(!rejected.approved);
        assert_eq!(rejected.change_requests, vec!["cite"]);
        assert!(ReviewDecision::Abort.to_feedback().is_none());
    }

    #[test]
    fn test_revision_update_clears_pass_outputs() {
        let mut state = ResearchState::new("q");
        state.draft_report = Some(report("draft"));
        state.retrieved_chunks.push(RetrievedChunk {
            text: "t".into(),
            metadata: ChunkMetadata {
                source_url: "https://a".into(),
                source_title: "a".into(),
                sub_query_id: None,
                position: 0,
            },
            score: 0.5,
        });

        state.apply(revision_update(&state));

        assert!(state.retrieved_chunks.is_empty());
        assert!(state.draft_report.is_none());
        assert_eq!(state.last_draft.as_ref().map(|r| r.title.as_str()), Some("draft"));
        assert_eq!(state.best_draft().map(|r| r.title.as_str()), Some("draft"));
    }

    #[test]
    fn test_finalize_promotes_draft() {
        let mut state = ResearchState::new("q");
        state.draft_report = Some(report("draft"));
        state.apply(finalize_update(&state));
        assert_eq!(state.final_report.map(|r| r.title), Some("draft".to_string()));
    }
}
