//! # research-loop
//!
//! An iterative research workflow engine. A question is decomposed into
//! prioritized sub-queries, answered from the web, indexed into a vector
//! store and synthesized into a structured, cited report. A person reviews
//! every draft; rejected drafts are revised with their feedback until
//! approval or an iteration cap.
//!
//! ## Overview
//!
//! research-loop can be used in two ways:
//!
//! 1. **As a command-line tool** - Run the `research-loop` binary
//! 2. **As a library** - Build [`ResearchServices`] and drive a [`WorkflowEngine`]
//!
//! ### Basic Example
//!
//! ```rust,ignore
//! use research_loop::{ResearchConfig, ResearchServices, RunOutcome, WorkflowEngine};
//! use research_loop::research::ReviewDecision;
//!
//! #[tokio::main]
//! async fn main() -> research_loop::Result<()> {
//!     let config = ResearchConfig::load_or_default("research.toml")?;
//!     let services = ResearchServices::from_config(&config).await?;
//!     let engine = WorkflowEngine::new(services, config);
//!
//!     if let RunOutcome::AwaitingReview { session_id, .. } =
//!         engine.start("How do heat pumps perform in cold climates?").await?
//!     {
//!         engine.resume(&session_id, ReviewDecision::Approve).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API and compatible endpoints |
//! | `local-embeddings` | In-process embeddings via fastembed |
//!
//! ## Modules
//!
//! - [`research`] - Research state, stages and review
//! - [`workflows`] - Stage sequencing, checkpoints and resume
//! - [`db`] - Evidence store, vector store, checkpoints and report export
//! - [`rag`] - Chunking and embeddings
//! - [`tools`] - Web search and scraping
//! - [`llm`] - LLM client implementations
//! - [`cli`] - Command-line parsing and terminal output
//! - [`types`] - Common error handling

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// Evidence, vector, checkpoint and report storage.
pub mod db;
/// LLM provider clients and abstractions.
pub mod llm;
/// Chunking and embedding.
pub mod rag;
/// Research state, stage functions and review.
pub mod research;
/// Web search and page scraping.
pub mod tools;
/// Core error types.
pub mod types;
/// Configuration and text helpers.
pub mod utils;
/// Workflow engine for the research loop.
pub mod workflows;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use research::{ResearchServices, ResearchState, ReviewChannel, ReviewDecision, Stage};
pub use types::{AppError, Result};
pub use utils::toml_config::ResearchConfig;
pub use workflows::{RunOutcome, WorkflowEngine};
