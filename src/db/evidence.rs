//! Evidence store: the narrow store/query contract the pipeline depends on.
//!
//! [`VectorEvidenceStore`] composes an [`Embedder`] with a [`VectorStore`]
//! collection. Chunk ids are a hash of source url and window position, so
//! indexing the same page twice overwrites rather than duplicates.

use super::vectorstore::{Document, VectorStore};
use crate::rag::embeddings::Embedder;
use crate::research::models::ChunkMetadata;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Raw similarity as reported by a store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Similarity {
    /// L2-style distance, smaller is closer.
    Distance(f32),
    /// Cosine similarity, larger is closer.
    Cosine(f32),
}

impl Similarity {
    /// Relevance in [0, 1].
    pub fn relevance(self) -> f32 {
        let score = match self {
            Similarity::Distance(d) => 1.0 - d / 2.0,
            Similarity::Cosine(c) => c,
        };
        if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreMatch {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub similarity: Similarity,
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Persist texts with their metadata, returning one id per text.
    async fn store(&self, texts: &[String], metadata: &[ChunkMetadata]) -> Result<Vec<String>>;

    /// Return up to `k` chunks most similar to `text`.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<StoreMatch>>;

    async fn count(&self) -> Result<usize>;

    /// Remove every stored chunk.
    async fn clear(&self) -> Result<()>;
}

/// Deterministic chunk id for window `position` of `url`.
pub fn chunk_id(url: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"#");
    hasher.update(position.to_le_bytes());
    hex::encode(hasher.finalize())
}

pub struct VectorEvidenceStore {
    embedder: Arc<dyn Embedder>,
    vectors: Arc<dyn VectorStore>,
    collection: String,
}

impl VectorEvidenceStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorStore>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        if self.vectors.collection_exists(&self.collection).await? {
            return Ok(());
        }
        match self.vectors.create_collection(&self.collection, dimensions).await {
            Ok(()) => Ok(()),
            // lost a creation race with a concurrent writer
            Err(_) if self.vectors.collection_exists(&self.collection).await? => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl EvidenceStore for VectorEvidenceStore {
    async fn store(&self, texts: &[String], metadata: &[ChunkMetadata]) -> Result<Vec<String>> {
        if texts.len() != metadata.len() {
            return Err(AppError::InvalidInput(format!(
                "{} texts but {} metadata entries",
                texts.len(),
                metadata.len()
            )));
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.embedder.embed(texts).await?;
        let dimensions = embeddings.first().map(Vec::len).unwrap_or(0);
        self.ensure_collection(dimensions).await?;

        let documents: Vec<Document> = texts
            .iter()
            .zip(metadata)
            .zip(embeddings)
            .map(|((text, meta), embedding)| Document {
                id: chunk_id(&meta.source_url, meta.position),
                content: text.clone(),
                metadata: meta.clone(),
                embedding: Some(embedding),
            })
            .collect();

        self.vectors
            .upsert(&self.collection, &documents)
            .await
            .map_err(|e| AppError::external("evidence store", e))?;

        Ok(documents.into_iter().map(|d| d.id).collect())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<StoreMatch>> {
        if !self.vectors.collection_exists(&self.collection).await? {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed_one(text).await?;
        let matches = self
            .vectors
            .search(&self.collection, &embedding, k, f32::MIN)
            .await?;

        Ok(matches
            .into_iter()
            .map(|m| StoreMatch {
                id: m.document.id,
                text: m.document.content,
                metadata: m.document.metadata,
                similarity: Similarity::Cosine(m.score),
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        self.vectors.count(&self.collection).await
    }

    async fn clear(&self) -> Result<()> {
        if self.vectors.collection_exists(&self.collection).await? {
            self.vectors.delete_collection(&self.collection).await?;
        }
        tracing::info!(collection = %self.collection, "Cleared evidence store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::vectorstore::InMemoryVectorStore;

    /// Embeds text as letter-frequency over a tiny alphabet.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|ch| t.chars().filter(|c| c == ch).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn meta(url: &str, position: usize) -> ChunkMetadata {
        ChunkMetadata {
            source_url: url.to_string(),
            source_title: "t".to_string(),
            sub_query_id: None,
            position,
        }
    }

    fn store() -> VectorEvidenceStore {
        VectorEvidenceStore::new(
            Arc::new(LetterEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "evidence",
        )
    }

    #[test]
    fn test_similarity_relevance() {
        assert_eq!(Similarity::Distance(0.0).relevance(), 1.0);
        assert_eq!(Similarity::Distance(1.0).relevance(), 0.5);
        assert_eq!(Similarity::Distance(3.0).relevance(), 0.0);
        assert_eq!(Similarity::Cosine(0.8).relevance(), 0.8);
        assert_eq!(Similarity::Cosine(-0.4).relevance(), 0.0);
    }

    #[test]
    fn test_chunk_id_deterministic() {
        assert_eq!(chunk_id("https://a", 0), chunk_id("https://a", 0));
        assert_ne!(chunk_id("https://a", 0), chunk_id("https://a", 1));
        assert_eq!(chunk_id("https://a", 0).len(), 64);
    }

    #[tokio::test]
    async fn test_store_and_query() {
        let store = store();
        assert!(store.query("aaa", 5).await.unwrap().is_empty());

        let ids = store
            .store(
                &["aaaa".to_string(), "bbbb".to_string()],
                &[meta("https://a", 0), meta("https://b", 0)],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let matches = store.query("aa", 1).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].metadata.source_url, "https://a");
        assert_eq!(matches[0].similarity.relevance(), 1.0);
    }

    #[tokio::test]
    async fn test_restore_is_idempotent() {
        let store = store();
        let texts = ["abc".to_string()];
        let metas = [meta("https://a", 3)];
        let first = store.store(&texts, &metas).await.unwrap();
        let second = store.store(&texts, &metas).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store();
        store
            .store(&["abc".to_string()], &[meta("https://a", 0)])
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_mismatched_lengths() {
        let result = store().store(&["abc".to_string()], &[]).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
