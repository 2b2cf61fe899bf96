//! TOML-based configuration for research-loop
//!
//! Every section and field has a default, so an empty `research.toml` (or no
//! file at all) yields a runnable local setup: Ollama for generation and
//! embeddings, DuckDuckGo search, evidence and checkpoints under `./data`.
//!
//! Secrets are never stored in the file. Fields ending in `_env` name the
//! environment variable that holds the value.

use crate::llm::Provider;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LlmConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_llm_model")]
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::Ollama {
            base_url: default_ollama_url(),
            model: default_llm_model(),
        }
    }
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
    /// In-process fastembed model (`local-embeddings` feature).
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_backend")]
    pub backend: EmbeddingBackend,

    #[serde(default = "default_embedding_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable containing an API key, if the endpoint needs one
    pub api_key_env: Option<String>,

    #[serde(default = "default_embedding_batch")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Http
}

fn default_embedding_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_batch() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: default_embedding_backend(),
            base_url: default_embedding_url(),
            model: default_embedding_model(),
            api_key_env: None,
            batch_size: default_embedding_batch(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

// ============= Gathering Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,
}

fn default_results_per_query() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_per_query: default_results_per_query(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Pages fetched per pass
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Simultaneous fetches per batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_scrape_timeout")]
    pub timeout_secs: u64,

    /// Cap on extracted text per page
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Pages with fewer words are dropped
    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

fn default_max_pages() -> usize {
    15
}

fn default_concurrency() -> usize {
    3
}

fn default_scrape_timeout() -> u64 {
    10
}

fn default_max_chars() -> usize {
    8_000
}

fn default_min_words() -> usize {
    50
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            timeout_secs: default_scrape_timeout(),
            max_chars: default_max_chars(),
            min_words: default_min_words(),
        }
    }
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Evidence Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_min_chunk_words")]
    pub min_chunk_words: usize,

    /// Collection shared by sessions using the same store
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Directory for the persistent evidence store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Keep evidence in memory only
    #[serde(default)]
    pub in_memory: bool,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_min_chunk_words() -> usize {
    50
}

fn default_collection() -> String {
    "research".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/evidence")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_words: default_min_chunk_words(),
            collection: default_collection(),
            data_dir: default_data_dir(),
            in_memory: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Results per query against the evidence store
    #[serde(default = "default_per_query_k")]
    pub per_query_k: usize,

    /// Global cap on retrieved chunks
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    #[serde(default = "default_max_medium_queries")]
    pub max_medium_queries: usize,

    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,

    /// Length of the leading-text key used to drop near-duplicate chunks
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
}

fn default_per_query_k() -> usize {
    5
}

fn default_max_chunks() -> usize {
    20
}

fn default_max_medium_queries() -> usize {
    2
}

fn default_min_chunk_chars() -> usize {
    50
}

fn default_dedup_prefix_chars() -> usize {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            per_query_k: default_per_query_k(),
            max_chunks: default_max_chunks(),
            max_medium_queries: default_max_medium_queries(),
            min_chunk_chars: default_min_chunk_chars(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
        }
    }
}

// ============= Synthesis & Workflow =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Retrieved chunks rendered into the prompt
    #[serde(default = "default_prompt_chunks")]
    pub prompt_chunks: usize,

    /// Characters kept from each rendered chunk
    #[serde(default = "default_chunk_excerpt_chars")]
    pub chunk_excerpt_chars: usize,

    /// Leading search results that also receive citation ids
    #[serde(default = "default_search_citations")]
    pub search_citations: usize,
}

fn default_prompt_chunks() -> usize {
    15
}

fn default_chunk_excerpt_chars() -> usize {
    1_500
}

fn default_search_citations() -> usize {
    20
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            prompt_chunks: default_prompt_chunks(),
            chunk_excerpt_chars: default_chunk_excerpt_chars(),
            search_citations: default_search_citations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// libsql database holding review checkpoints
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Clear the evidence collection before every new session
    #[serde(default)]
    pub clear_store_on_start: bool,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_checkpoint_path() -> String {
    "./data/checkpoints.db".to_string()
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            checkpoint_path: default_checkpoint_path(),
            report_dir: default_report_dir(),
            clear_store_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Configuration(e.to_string())
    }
}

impl ResearchConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ResearchConfig = toml::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(path)) => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Check numeric ranges. Environment variables are resolved lazily.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid =
            |msg: &str| -> Result<(), ConfigError> { Err(ConfigError::ValidationError(msg.to_string())) };

        if self.workflow.max_iterations == 0 {
            return invalid("workflow.max_iterations must be at least 1");
        }
        if self.index.chunk_size == 0 {
            return invalid("index.chunk_size must be greater than 0");
        }
        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "index.chunk_overlap ({}) must be smaller than index.chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }
        if self.index.collection.trim().is_empty() {
            return invalid("index.collection must not be empty");
        }
        if self.scrape.concurrency == 0 {
            return invalid("scrape.concurrency must be at least 1");
        }
        if self.scrape.timeout_secs == 0 {
            return invalid("scrape.timeout_secs must be at least 1");
        }
        if self.scrape.max_pages == 0 || self.scrape.max_chars == 0 {
            return invalid("scrape.max_pages and scrape.max_chars must be greater than 0");
        }
        if self.search.results_per_query == 0 {
            return invalid("search.results_per_query must be greater than 0");
        }
        if self.retrieval.per_query_k == 0 || self.retrieval.max_chunks == 0 {
            return invalid("retrieval.per_query_k and retrieval.max_chunks must be greater than 0");
        }
        if self.retrieval.dedup_prefix_chars == 0 {
            return invalid("retrieval.dedup_prefix_chars must be greater than 0");
        }
        if self.synthesis.prompt_chunks == 0 {
            return invalid("synthesis.prompt_chunks must be greater than 0");
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be greater than 0");
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_name).map_err(|_| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Build the LLM provider, resolving its API key from the environment
    pub fn llm_provider(&self) -> Result<Provider, ConfigError> {
        Ok(match &self.llm {
            LlmConfig::Ollama { base_url, model } => Provider::Ollama {
                base_url: base_url.clone(),
                model: model.clone(),
            },
            LlmConfig::OpenAI {
                api_key_env,
                api_base,
                model,
            } => Provider::OpenAI {
                api_key: self.resolve_env(api_key_env)?,
                api_base: api_base.clone(),
                model: model.clone(),
            },
        })
    }

    /// The embedding endpoint's API key, if one is configured
    pub fn embedding_api_key(&self) -> Result<Option<String>, ConfigError> {
        self.embedding
            .api_key_env
            .as_deref()
            .map(|name| self.resolve_env(name))
            .transpose()
    }
}
