//! The research pipeline: session state and the seven stage functions.
//!
//! # Architecture
//!
//! Stages never call each other. Each one reads the [`ResearchState`] and
//! returns a [`StateUpdate`]; the workflow engine applies it and moves on.
//!
//! | Stage | Function | Reads | Writes |
//! |-------|----------|-------|--------|
//! | decompose | [`decompose::decompose`] | question, feedback | sub-queries, iteration |
//! | search | [`gather::search`] | sub-queries | search results |
//! | scrape | [`gather::scrape`] | search results | scraped pages |
//! | index | [`index::index`] | scraped pages | stored chunk ids |
//! | retrieve | [`retrieve::retrieve`] | question, sub-queries, feedback | retrieved chunks |
//! | synthesize | [`synthesize::synthesize`] | retrieved chunks, search results | draft report |
//! | review | [`review`] | draft report | feedback |
//!
//! # Usage
//!
//! ```ignore
//! use research_loop::research::{decompose::decompose, ResearchState};
//!
//! let mut state = ResearchState::new("How do vector databases index embeddings?");
//! let update = decompose(&state, services.llm.as_ref()).await?;
//! state.apply(update);
//! for sq in &state.sub_queries {
//!     println!("[{:?}] {}", sq.priority, sq.query);
//! }
//! ```

pub mod decompose;
pub mod gather;
pub mod index;
pub mod models;
pub mod parse;
pub mod retrieve;
pub mod review;
pub mod services;
pub mod state;
pub mod synthesize;

pub use models::{HumanFeedback, Priority, Report, SubQuery};
pub use review::{ReviewChannel, ReviewDecision};
pub use services::ResearchServices;
pub use state::{ResearchState, Stage, StateUpdate};
