//! Persistence: evidence vectors, session checkpoints and report export.
//!
//! This module provides:
//! - **Vector store**: [`AresVectorStore`] (HNSW, on disk) and [`InMemoryVectorStore`]
//! - **Evidence store**: [`VectorEvidenceStore`], chunk store/query on top of embeddings
//! - **Checkpoints**: [`SqliteCheckpointStore`] (libsql) and [`InMemoryCheckpointStore`]
//! - **Export**: [`ReportExporter`] writes finished reports as JSON

// Vector store abstraction layer
pub mod vectorstore;

// Pure Rust HNSW vector store (default)
#[cfg(feature = "ares-vector")]
pub mod ares_vector;

// Chunk store/query contract used by the pipeline
pub mod evidence;

// Relational database
pub mod checkpoint;

pub mod export;

// Re-exports
pub use checkpoint::{CheckpointStore, InMemoryCheckpointStore, SessionSummary, SqliteCheckpointStore};
pub use evidence::{EvidenceStore, Similarity, StoreMatch, VectorEvidenceStore};
pub use export::ReportExporter;
pub use vectorstore::{InMemoryVectorStore, VectorStore};

#[cfg(feature = "ares-vector")]
pub use ares_vector::AresVectorStore;
