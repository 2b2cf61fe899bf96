//! Workflow Engine Module
//!
//! Sequences the research stages, suspends at human review and resumes
//! from checkpoints.
//!
//! # Configuration
//!
//! ```toml
//! [workflow]
//! max_iterations = 3
//! checkpoint_path = "./data/checkpoints.db"
//! report_dir = "./reports"
//! clear_store_on_start = false
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngine::new(services, config);
//! match engine.start("What limits solid-state battery adoption?").await? {
//!     RunOutcome::AwaitingReview { session_id, draft } => {
//!         println!("{}: {}", session_id, draft.title);
//!         let outcome = engine.resume(&session_id, ReviewDecision::Approve).await?;
//!     }
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod engine;

pub use engine::{route_after_review, RunOutcome, Transition, WorkflowEngine};
