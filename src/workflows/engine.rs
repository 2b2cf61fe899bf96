//! Workflow Engine
//!
//! Drives a research session through the fixed stage graph
//!
//! ```text
//! decompose → search → scrape → index → retrieve → synthesize → review
//!     ▲                                                            │
//!     └──────────────────────── rejected ──────────────────────────┘
//! ```
//!
//! and suspends at review. [`WorkflowEngine::start`] runs until the first
//! draft is ready and checkpoints the session; [`WorkflowEngine::resume`]
//! loads the checkpoint, applies the reviewer's decision and either finishes
//! or runs another pass. Leaving review is decided by the pure
//! [`route_after_review`] function.

use crate::db::checkpoint::SessionSummary;
use crate::rag::chunker::TextChunker;
use crate::research::models::Report;
use crate::research::review::{self, ReviewChannel, ReviewDecision};
use crate::research::services::ResearchServices;
use crate::research::state::{ResearchState, Stage, StateUpdate};
use crate::research::{decompose, gather, index, retrieve, synthesize};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ResearchConfig;
use std::path::PathBuf;
use std::time::Instant;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Review channels block on the reviewer. On a multi-threaded runtime the
/// worker is handed off first so other tasks keep running.
fn ask(
    channel: &mut dyn ReviewChannel,
    session_id: &str,
    draft: &Report,
) -> Result<ReviewDecision> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| channel.review(session_id, draft))
        }
        _ => channel.review(session_id, draft),
    }
}

/// Where the session goes after review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Run another decomposition pass with the reviewer's feedback.
    Decompose,
    /// Promote the draft to final and stop.
    Done,
    Error,
}

/// Decide the next step after a review has been recorded.
///
/// Approval, missing feedback, or reaching `max_iterations` all end the
/// session. Only a rejection below the cap loops back.
pub fn route_after_review(state: &ResearchState, max_iterations: u32) -> Transition {
    if state.stage == Stage::Error || state.best_draft().is_none() {
        return Transition::Error;
    }
    match &state.feedback {
        None => Transition::Done,
        Some(feedback) if feedback.approved => Transition::Done,
        Some(_) if state.iteration >= max_iterations => Transition::Done,
        Some(_) => Transition::Decompose,
    }
}

/// Result of driving a session until it needs a person or stops.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Checkpointed at review; call `resume` with a decision.
    AwaitingReview { session_id: String, draft: Report },
    Completed {
        session_id: String,
        report: Report,
        /// The iteration cap ended the session over a rejection.
        forced: bool,
        report_path: Option<PathBuf>,
    },
    Aborted { session_id: String },
    Failed {
        session_id: String,
        errors: Vec<String>,
        /// Most recent draft, if synthesis ever succeeded.
        best_draft: Option<Report>,
    },
}

impl RunOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            RunOutcome::AwaitingReview { session_id, .. }
            | RunOutcome::Completed { session_id, .. }
            | RunOutcome::Aborted { session_id }
            | RunOutcome::Failed { session_id, .. } => session_id,
        }
    }
}

/// Workflow engine that sequences the research stages
pub struct WorkflowEngine {
    services: ResearchServices,
    config: ResearchConfig,
    chunker: TextChunker,
}

impl WorkflowEngine {
    pub fn new(services: ResearchServices, config: ResearchConfig) -> Self {
        let chunker = TextChunker::new(
            config.index.chunk_size,
            config.index.chunk_overlap,
            config.index.min_chunk_words,
        );
        Self {
            services,
            config,
            chunker,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub fn services(&self) -> &ResearchServices {
        &self.services
    }

    /// Start a new session and run it up to the first review.
    ///
    /// An empty question is rejected before any service is touched.
    pub async fn start(&self, question: &str) -> Result<RunOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput(
                "research question must not be empty".to_string(),
            ));
        }

        let state = ResearchState::new(question);
        tracing::info!(session_id = %state.session_id, question, "Starting research session");

        if self.config.workflow.clear_store_on_start {
            self.services.evidence.clear().await?;
        }

        self.run_until_review(state).await
    }

    /// Apply a review decision to a suspended session and continue it.
    pub async fn resume(&self, session_id: &str, decision: ReviewDecision) -> Result<RunOutcome> {
        let mut state = self.load_session(session_id).await?;
        if state.stage != Stage::Review {
            return Err(AppError::InvalidInput(format!(
                "session {} is not awaiting review (stage: {})",
                session_id, state.stage
            )));
        }

        if decision == ReviewDecision::Abort {
            tracing::info!(session_id, "Session aborted by reviewer");
            state.apply(StateUpdate::new().with_stage(Stage::Done));
            self.services.checkpoints.save(&state).await?;
            return Ok(RunOutcome::Aborted {
                session_id: state.session_id,
            });
        }

        state.apply(review::record_decision(&decision));

        match route_after_review(&state, self.config.workflow.max_iterations) {
            Transition::Done => self.finish(state).await,
            Transition::Decompose => {
                tracing::info!(
                    session_id,
                    iteration = state.iteration,
                    "Draft rejected, starting revision pass"
                );
                let update = review::revision_update(&state).with_stage(Stage::Decompose);
                state.apply(update);
                self.run_until_review(state).await
            }
            Transition::Error => {
                state.apply(
                    StateUpdate::new()
                        .with_stage(Stage::Error)
                        .with_errors(vec!["review: no draft to finalize".to_string()]),
                );
                self.services.checkpoints.save(&state).await?;
                Ok(Self::failed(&state))
            }
        }
    }

    /// Run a session end to end, asking `channel` at every review.
    pub async fn run_interactive(
        &self,
        question: &str,
        channel: &mut dyn ReviewChannel,
    ) -> Result<RunOutcome> {
        let outcome = self.start(question).await?;
        self.drive(outcome, channel).await
    }

    /// Keep resuming while the outcome is a pending review.
    pub async fn drive(
        &self,
        mut outcome: RunOutcome,
        channel: &mut dyn ReviewChannel,
    ) -> Result<RunOutcome> {
        loop {
            match outcome {
                RunOutcome::AwaitingReview { session_id, draft } => {
                    let decision = ask(channel, &session_id, &draft)?;
                    outcome = self.resume(&session_id, decision).await?;
                }
                other => return Ok(other),
            }
        }
    }

    /// The outcome a checkpointed session is currently in.
    pub async fn status(&self, session_id: &str) -> Result<RunOutcome> {
        let state = self.load_session(session_id).await?;
        Ok(match (state.stage, &state.draft_report) {
            (Stage::Review, Some(draft)) => RunOutcome::AwaitingReview {
                session_id: state.session_id.clone(),
                draft: draft.clone(),
            },
            (Stage::Done, _) => match &state.final_report {
                Some(report) => RunOutcome::Completed {
                    session_id: state.session_id.clone(),
                    report: report.clone(),
                    forced: state.revision_feedback().is_some(),
                    report_path: self
                        .services
                        .exporter
                        .as_ref()
                        .map(|e| e.path_for(&state.session_id)),
                },
                None => RunOutcome::Aborted {
                    session_id: state.session_id.clone(),
                },
            },
            _ => Self::failed(&state),
        })
    }

    pub async fn load_session(&self, session_id: &str) -> Result<ResearchState> {
        self.services
            .checkpoints
            .load(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSummary>> {
        self.services.checkpoints.list().await
    }

    async fn run_stage(&self, stage: Stage, state: &ResearchState) -> Result<StateUpdate> {
        let services = &self.services;
        let config = &self.config;
        match stage {
            Stage::Decompose => decompose::decompose(state, services.llm.as_ref()).await,
            Stage::Search => gather::search(state, services.search.as_ref(), &config.search).await,
            Stage::Scrape => gather::scrape(state, services.scraper.as_ref(), &config.scrape).await,
            Stage::Index => index::index(state, services.evidence.as_ref(), &self.chunker).await,
            Stage::Retrieve => {
                retrieve::retrieve(state, services.evidence.as_ref(), &config.retrieval).await
            }
            Stage::Synthesize => {
                synthesize::synthesize(state, services.llm.as_ref(), &config.synthesis).await
            }
            Stage::Review | Stage::Done | Stage::Error => Err(AppError::Internal(format!(
                "stage {} is not executable",
                stage
            ))),
        }
    }

    /// Execute stages in order until the session reaches review or fails.
    async fn run_until_review(&self, mut state: ResearchState) -> Result<RunOutcome> {
        loop {
            let stage = state.stage;
            match stage {
                Stage::Review => {
                    let Some(draft) = state.draft_report.clone() else {
                        return Err(AppError::Internal(
                            "reached review without a draft".to_string(),
                        ));
                    };
                    self.services.checkpoints.save(&state).await?;
                    tracing::info!(
                        session_id = %state.session_id,
                        iteration = state.iteration,
                        "Draft ready for review"
                    );
                    return Ok(RunOutcome::AwaitingReview {
                        session_id: state.session_id,
                        draft,
                    });
                }
                Stage::Done | Stage::Error => return Ok(Self::failed(&state)),
                _ => {}
            }

            let started = Instant::now();
            match self.run_stage(stage, &state).await {
                Ok(update) => {
                    let advisory = update.errors.len();
                    state.apply(update.with_stage(stage.successor()));
                    tracing::info!(
                        session_id = %state.session_id,
                        stage = %stage,
                        duration_ms = started.elapsed().as_millis() as u64,
                        advisory_errors = advisory,
                        "Stage complete"
                    );
                }
                Err(e) => {
                    tracing::error!(session_id = %state.session_id, stage = %stage, error = %e, "Stage failed");
                    state.apply(
                        StateUpdate::new()
                            .with_stage(Stage::Error)
                            .with_errors(vec![format!("{}: {}", stage, e)]),
                    );
                    self.services.checkpoints.save(&state).await?;
                    return Ok(Self::failed(&state));
                }
            }
        }
    }

    async fn finish(&self, mut state: ResearchState) -> Result<RunOutcome> {
        let forced = state.revision_feedback().is_some();
        if forced {
            tracing::warn!(
                session_id = %state.session_id,
                iteration = state.iteration,
                max_iterations = self.config.workflow.max_iterations,
                "Iteration limit reached, accepting current draft; it may not address the latest feedback"
            );
        }

        let update = review::finalize_update(&state).with_stage(Stage::Done);
        state.apply(update);
        let Some(report) = state.final_report.clone() else {
            return Err(AppError::Internal("no draft to finalize".to_string()));
        };

        let report_path = match &self.services.exporter {
            Some(exporter) => match exporter.export(&state.session_id, &report).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "Report export failed");
                    state.apply(StateUpdate::new().with_errors(vec![format!("export: {}", e)]));
                    None
                }
            },
            None => None,
        };

        self.services.checkpoints.save(&state).await?;
        tracing::info!(session_id = %state.session_id, forced, "Session complete");

        Ok(RunOutcome::Completed {
            session_id: state.session_id,
            report,
            forced,
            report_path,
        })
    }

    fn failed(state: &ResearchState) -> RunOutcome {
        RunOutcome::Failed {
            session_id: state.session_id.clone(),
            errors: state.errors.clone(),
            best_draft: state.best_draft().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::{HumanFeedback, ReportMetadata};
    use chrono::Utc;

    fn draft() -> Report {
        Report {
            title: "Draft".into(),
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

    fn reviewed(iteration: u32, feedback: Option<HumanFeedback>) -> ResearchState {
        let mut state = ResearchState::new("q");
        state.stage = Stage::Review;
        state.iteration = iteration;
        state.draft_report = Some(draft());
        state.feedback = feedback;
        state
    }

    #[test]
    fn test_route_approved_is_done() {
        let state = reviewed(1, Some(HumanFeedback::approve()));
        assert_eq!(route_after_review(&state, 3), Transition::Done);
    }

    #[test]
    fn test_route_without_feedback_is_done() {
        assert_eq!(route_after_review(&reviewed(1, None), 3), Transition::Done);
    }

    #[test]
    fn test_route_rejected_below_cap_loops() {
        let state = reviewed(2, Some(HumanFeedback::reject("more", vec![])));
        assert_eq!(route_after_review(&state, 3), Transition::Decompose);
    }

    #[test]
    fn test_route_rejected_at_cap_is_done() {
        let state = reviewed(3, Some(HumanFeedback::reject("more", vec![])));
        assert_eq!(route_after_review(&state, 3), Transition::Done);
    }

    #[test]
    fn test_route_without_draft_is_error() {
        let mut state = reviewed(1, Some(HumanFeedback::approve()));
        state.draft_report = None;
        assert_eq!(route_after_review(&state, 3), Transition::Error);
    }
}
