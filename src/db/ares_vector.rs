//! AresVector-backed evidence vectors
//!
//! Nearest-neighbour search runs on an `ares-vector` HNSW index. Chunk text,
//! metadata and embeddings are kept beside it in `<dir>/documents.json`, which
//! is the source of truth on disk: the index is rebuilt from it on open.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = AresVectorStore::new(Some("./data/evidence".into())).await?;
//! store.create_collection("evidence", 768).await?;
//! store.upsert("evidence", &documents).await?;
//! let hits = store.search("evidence", &query_embedding, 10, 0.0).await?;
//! ```

use super::vectorstore::{Document, VectorMatch, VectorStore};
use crate::types::{AppError, Result};
use ares_vector::{Config, DistanceMetric, Error as VectorError, VectorDb, VectorMetadata};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DOCUMENTS_FILE: &str = "documents.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredCollection {
    dimensions: usize,
    documents: HashMap<String, Document>,
}

/// HNSW vector store with an optional on-disk document file.
pub struct AresVectorStore {
    /// The underlying vector database (VectorDb is Clone and uses Arc internally)
    db: VectorDb,
    /// Storage path (None for in-memory)
    path: Option<PathBuf>,
    documents: Arc<RwLock<HashMap<String, StoredCollection>>>,
}

impl AresVectorStore {
    /// Create a store, loading `<path>/documents.json` when a path is given.
    ///
    /// A document file that cannot be parsed is moved aside to
    /// `documents.json.corrupt` and the store starts empty.
    pub async fn new(path: Option<PathBuf>) -> Result<Self> {
        let db = VectorDb::open(Config::memory()).await.map_err(|e| {
            AppError::Configuration(format!("Failed to initialize AresVector: {}", e))
        })?;

        let store = Self {
            db,
            path,
            documents: Arc::new(RwLock::new(HashMap::new())),
        };

        if let Some(ref path) = store.path {
            store.load_documents(path).await?;
            store.rebuild_index().await?;
        }

        Ok(store)
    }

    async fn load_documents(&self, path: &Path) -> Result<()> {
        let docs_path = path.join(DOCUMENTS_FILE);
        if !tokio::fs::try_exists(&docs_path).await.unwrap_or(false) {
            return Ok(());
        }

        let data = tokio::fs::read_to_string(&docs_path).await.map_err(|e| {
            AppError::Configuration(format!("Failed to read documents file: {}", e))
        })?;

        match serde_json::from_str::<HashMap<String, StoredCollection>>(&data) {
            Ok(loaded) => {
                *self.documents.write() = loaded;
                Ok(())
            }
            Err(e) => {
                let aside = path.join(format!("{}.corrupt", DOCUMENTS_FILE));
                tracing::warn!(
                    path = %docs_path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Unreadable documents file, starting with an empty store"
                );
                tokio::fs::rename(&docs_path, &aside).await.map_err(|e| {
                    AppError::Configuration(format!("Failed to move documents file aside: {}", e))
                })
            }
        }
    }

    async fn rebuild_index(&self) -> Result<()> {
        let snapshot: Vec<(String, usize, Vec<(String, Vec<f32>)>)> = {
            let docs = self.documents.read();
            docs.iter()
                .map(|(name, col)| {
                    let vectors = col
                        .documents
                        .values()
                        .filter_map(|d| Some((d.id.clone(), d.embedding.clone()?)))
                        .collect();
                    (name.clone(), col.dimensions, vectors)
                })
                .collect()
        };

        for (name, dimensions, vectors) in snapshot {
            self.db
                .create_collection(&name, dimensions, DistanceMetric::Cosine)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create collection: {}", e)))?;

            let mut loaded = 0;
            for (id, embedding) in &vectors {
                match self.db.insert(&name, id, embedding, None).await {
                    Ok(()) => loaded += 1,
                    Err(e) => tracing::warn!(collection = %name, id = %id, error = %e, "Skipping stored vector"),
                }
            }
            tracing::debug!(collection = %name, vectors = loaded, "Rebuilt vector index");
        }
        Ok(())
    }

    /// Write the document file through a temporary file and a rename so a
    /// crash never leaves a half-written file behind.
    async fn save_documents(&self) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };

        // Serialize under the lock, write without it
        let data = {
            let docs = self.documents.read();
            serde_json::to_string(&*docs).map_err(|e| {
                AppError::Internal(format!("Failed to serialize documents: {}", e))
            })?
        };

        tokio::fs::create_dir_all(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to create data directory: {}", e))
        })?;

        let docs_path = path.join(DOCUMENTS_FILE);
        let tmp_path = path.join(format!("{}.tmp", DOCUMENTS_FILE));
        tokio::fs::write(&tmp_path, data).await.map_err(|e| {
            AppError::Internal(format!("Failed to write documents file: {}", e))
        })?;
        tokio::fs::rename(&tmp_path, &docs_path).await.map_err(|e| {
            AppError::Internal(format!("Failed to replace documents file: {}", e))
        })
    }

    fn dimensions(&self, collection: &str) -> Result<usize> {
        self.documents
            .read()
            .get(collection)
            .map(|col| col.dimensions)
            .ok_or_else(|| missing(collection))
    }
}

fn missing(name: &str) -> AppError {
    AppError::NotFound(format!("Collection '{}' not found", name))
}

fn vector_error(e: VectorError) -> AppError {
    match e {
        VectorError::CollectionNotFound(name) => missing(&name),
        VectorError::CollectionExists(name) => {
            AppError::InvalidInput(format!("Collection '{}' already exists", name))
        }
        VectorError::DimensionMismatch { expected, actual } => AppError::InvalidInput(format!(
            "Vector has {} dimensions, collection expects {}",
            actual, expected
        )),
        VectorError::InvalidVector(msg) => AppError::InvalidInput(msg),
        other => AppError::Internal(format!("Vector index error: {}", other)),
    }
}

#[async_trait]
impl VectorStore for AresVectorStore {
    fn provider_name(&self) -> &'static str {
        "ares-vector"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if self.db.collection_exists(name) {
            return Err(AppError::InvalidInput(format!(
                "Collection '{}' already exists",
                name
            )));
        }

        self.db
            .create_collection(name, dimensions, DistanceMetric::Cosine)
            .await
            .map_err(vector_error)?;

        self.documents.write().insert(
            name.to_string(),
            StoredCollection {
                dimensions,
                documents: HashMap::new(),
            },
        );
        self.save_documents().await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.db.delete_collection(name).await.map_err(vector_error)?;
        self.documents.write().remove(name);
        self.save_documents().await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.db.collection_exists(name))
    }

    async fn upsert(&self, collection: &str, documents: &[Document]) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let dimensions = self.dimensions(collection)?;
        for doc in documents {
            let embedding = doc.embedding.as_ref().ok_or_else(|| {
                AppError::InvalidInput(format!("Document '{}' is missing embedding", doc.id))
            })?;
            if embedding.len() != dimensions {
                return Err(AppError::InvalidInput(format!(
                    "Document '{}' has {} dimensions, collection expects {}",
                    doc.id,
                    embedding.len(),
                    dimensions
                )));
            }
        }

        for doc in documents {
            let meta = VectorMetadata::from_pairs([
                ("source_url", doc.metadata.source_url.clone()),
                ("source_title", doc.metadata.source_title.clone()),
            ]);
            if let Some(embedding) = &doc.embedding {
                self.db
                    .insert(collection, &doc.id, embedding, Some(meta))
                    .await
                    .map_err(vector_error)?;
            }

            {
                let mut docs = self.documents.write();
                let col = docs.entry(collection.to_string()).or_default();
                col.documents.insert(doc.id.clone(), doc.clone());
            }
        }

        self.save_documents().await?;
        Ok(documents.len())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<VectorMatch>> {
        if self.count(collection).await? == 0 {
            if !self.db.collection_exists(collection) {
                return Err(missing(collection));
            }
            return Ok(Vec::new());
        }

        // Fetch extra to survive threshold filtering and re-inserted ids
        let hits = self
            .db
            .search(collection, embedding, limit.saturating_mul(2))
            .await
            .map_err(vector_error)?;

        let docs = self.documents.read();
        let col = docs.get(collection).ok_or_else(|| missing(collection))?;

        let mut seen = HashSet::new();
        let mut results: Vec<VectorMatch> = hits
            .into_iter()
            .filter(|hit| hit.score >= threshold && seen.insert(hit.id.clone()))
            .filter_map(|hit| {
                let doc = col.documents.get(&hit.id)?;
                Some(VectorMatch {
                    document: Document {
                        embedding: None,
                        ..doc.clone()
                    },
                    score: hit.score,
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
            .documents
            .read()
            .get(collection)
            .map(|col| col.documents.len())
            .unwrap_or(0))
    }
}
