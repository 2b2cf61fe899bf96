//! Explicitly constructed service handles shared by the stages.
//!
//! Nothing here is global. The binary builds one [`ResearchServices`] from
//! config; tests build one from fakes. Dropping it releases every handle.

use crate::db::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use crate::db::evidence::{EvidenceStore, VectorEvidenceStore};
use crate::db::export::ReportExporter;
use crate::db::vectorstore::{InMemoryVectorStore, VectorStore};
use crate::llm::LLMClient;
use crate::rag::embeddings::{Embedder, HttpEmbedder};
use crate::tools::scrape::{HttpScraper, ScrapeService};
use crate::tools::search::{DaedraSearch, SearchService};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingBackend, ResearchConfig};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ResearchServices {
    pub llm: Arc<dyn LLMClient>,
    pub search: Arc<dyn SearchService>,
    pub scraper: Arc<dyn ScrapeService>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    /// Where completed reports are written; `None` skips export.
    pub exporter: Option<ReportExporter>,
}

impl ResearchServices {
    /// Connect every collaborator described by `config`.
    pub async fn from_config(config: &ResearchConfig) -> Result<Self> {
        let provider = config.llm_provider()?;
        tracing::info!(provider = provider.name(), model = provider.model(), "Connecting LLM");
        let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client().await?);

        let scraper = HttpScraper::new(config.scrape.timeout(), config.scrape.max_chars)?;

        Ok(Self {
            llm,
            search: Arc::new(DaedraSearch::new()),
            scraper: Arc::new(scraper),
            evidence: Arc::new(Self::evidence_store(config).await?),
            checkpoints: Arc::new(SqliteCheckpointStore::open(&config.workflow.checkpoint_path).await?),
            exporter: Some(ReportExporter::new(config.workflow.report_dir.clone())),
        })
    }

    /// Only the evidence store, for commands that do not need the model.
    pub async fn evidence_store(config: &ResearchConfig) -> Result<VectorEvidenceStore> {
        let vectors: Arc<dyn VectorStore> = if config.index.in_memory {
            Arc::new(InMemoryVectorStore::new())
        } else {
            Self::persistent_vectors(config).await?
        };

        Ok(VectorEvidenceStore::new(
            Self::embedder(config)?,
            vectors,
            config.index.collection.clone(),
        ))
    }

    #[cfg(feature = "ares-vector")]
    async fn persistent_vectors(config: &ResearchConfig) -> Result<Arc<dyn VectorStore>> {
        let store =
            crate::db::ares_vector::AresVectorStore::new(Some(config.index.data_dir.clone())).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "ares-vector"))]
    async fn persistent_vectors(_config: &ResearchConfig) -> Result<Arc<dyn VectorStore>> {
        Err(AppError::Configuration(
            "A persistent evidence store requires the ares-vector feature; \
             enable it or set index.in_memory = true"
                .to_string(),
        ))
    }

    fn embedder(config: &ResearchConfig) -> Result<Arc<dyn Embedder>> {
        let embedding = &config.embedding;
        match embedding.backend {
            EmbeddingBackend::Http => Ok(Arc::new(HttpEmbedder::new(
                &embedding.base_url,
                embedding.model.clone(),
                config.embedding_api_key()?,
                embedding.batch_size,
                Duration::from_secs(embedding.timeout_secs),
            )?)),
            #[cfg(feature = "local-embeddings")]
            EmbeddingBackend::Local => Ok(Arc::new(crate::rag::embeddings::FastEmbedder::new(
                &embedding.model,
                embedding.batch_size,
            )?)),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingBackend::Local => Err(AppError::Configuration(
                "local embeddings require the `local-embeddings` feature".to_string(),
            )),
        }
    }
}
