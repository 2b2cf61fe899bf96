//! Vector Store Abstraction Layer
//!
//! The evidence store sits on top of [`VectorStore`], which only knows about
//! named collections of embedded documents.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 VectorStore Trait                 │
//! ├───────────────────────────────────────────────────┤
//! │ create_collection │ upsert │ search │ count │ ... │
//! └───────────────────────────────────────────────────┘
//!                           ▲
//!              ┌────────────┴────────────┐
//!              │                         │
//!      ┌───────┴────────┐     ┌──────────┴──────────┐
//!      │ AresVectorStore│     │ InMemoryVectorStore │
//!      │ HNSW + on-disk │     │ brute-force cosine  │
//!      │ document file  │     │ index.in_memory     │
//!      └────────────────┘     └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use research_loop::db::vectorstore::{InMemoryVectorStore, VectorStore};
//!
//! let store = InMemoryVectorStore::new();
//! store.create_collection("evidence", 768).await?;
//! store.upsert("evidence", &documents).await?;
//! let hits = store.search("evidence", &query_embedding, 5, 0.0).await?;
//! ```

use crate::research::models::ChunkMetadata;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A chunk of text with its metadata and, once embedded, its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A document returned by similarity search. `score` is cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub document: Document,
    pub score: f32,
}

/// Abstract trait for vector database operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Get the name of this vector store provider.
    fn provider_name(&self) -> &'static str;

    /// Create a collection with the specified vector dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Upsert embedded documents. Documents with an existing id are replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if a document is missing its embedding or the
    /// embedding has the wrong dimensionality.
    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize>;

    /// Search for similar vectors, sorted by score (descending).
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>>;

    /// Count documents in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;
}

#[derive(Debug, Clone, Default)]
struct InMemoryCollection {
    dimensions: usize,
    documents: HashMap<String, Document>,
}

/// Brute-force cosine store kept entirely in memory.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, InMemoryCollection>>,
}

impl InMemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Calculate cosine similarity between two vectors.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot_product / (norm_a * norm_b)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(name: &str) -> AppError {
    AppError::NotFound(format!("Collection '{}' not found", name))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        {
            let mut collections = self.collections.write();
            if collections.contains_key(name) {
                return Err(AppError::InvalidInput(format!(
                    "Collection '{}' already exists",
                    name
                )));
            }
            collections.insert(
                name.to_string(),
                InMemoryCollection {
                    dimensions,
                    documents: HashMap::new(),
                },
            );
        }
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections
            .write()
            .remove(name)
            .ok_or_else(|| missing(name))?;
        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(name))
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        let mut collections = self.collections.write();
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        for doc in documents {
            let embedding = doc.embedding.as_ref().ok_or_else(|| {
                AppError::InvalidInput(format!("Document '{}' is missing embedding", doc.id))
            })?;
            if embedding.len() != col.dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Document '{}' has {} dimensions, collection expects {}",
                    doc.id,
                    embedding.len(),
                    col.dimensions
                )));
            }
        }

        for doc in documents {
            col.documents.insert(doc.id.clone(), doc.clone());
        }
        Ok(documents.len())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>> {
        let collections = self.collections.read();
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;

        let mut results: Vec<VectorMatch> = col
            .documents
            .values()
            .filter_map(|doc| {
                let score = Self::cosine_similarity(embedding, doc.embedding.as_ref()?);
                (score >= threshold).then(|| VectorMatch {
                    document: Document {
                        embedding: None,
                        ..doc.clone()
                    },
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.document.id.cmp(&b.document.id))
        });
        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|col| col.documents.len())
            .unwrap_or(0))
    }
}
