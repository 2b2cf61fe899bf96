//! Mock implementations for testing.
//!
//! Scripted stand-ins for the model, search, scraper and embedder so the
//! workflow can be driven end to end without network access. The evidence
//! store itself is real: a [`VectorEvidenceStore`] over an in-memory
//! [`InMemoryVectorStore`] fed by [`HashEmbedder`].

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use research_loop::db::{InMemoryCheckpointStore, InMemoryVectorStore, ReportExporter, VectorEvidenceStore};
use research_loop::llm::LLMClient;
use research_loop::rag::Embedder;
use research_loop::tools::{ScrapeError, ScrapeService, ScrapedContent, SearchHit, SearchService};
use research_loop::types::{AppError, Result};
use research_loop::utils::toml_config::ResearchConfig;
use research_loop::ResearchServices;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const PLAN: &str = r#"{"sub_queries": [
    {"query": "solid-state battery cost", "rationale": "cost", "priority": "high"},
    {"query": "solid-state battery manufacturing", "rationale": "scale", "priority": "medium"},
    {"query": "solid-state battery safety", "rationale": "risk", "priority": "low"}
]}"#;

pub fn report_json(title: &str) -> String {
    format!(
        r#"Here is the report:
```json
{{"title": "{}", "executive_summary": "Costs are the main barrier.",
  "sections": [{{"title": "Cost", "body": "Cell costs remain high [1].", "citations": [1, 2, 99]}}],
  "conclusions": "Adoption depends on manufacturing scale."}}
```"#,
        title
    )
}

/// Scripted LLM client.
///
/// Decomposition calls get the plan; synthesis calls pop the next scripted
/// report (the last one repeats). Every call is recorded.
pub struct MockLLMClient {
    plan: String,
    reports: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<(String, String)>>,
    should_fail: bool,
}

impl MockLLMClient {
    pub fn new(plan: &str, report: &str) -> Self {
        Self::with_reports(plan, vec![report.to_string()])
    }

    pub fn with_reports(plan: &str, reports: Vec<String>) -> Self {
        Self {
            plan: plan.to_string(),
            reports: Mutex::new(reports.into()),
            calls: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            plan: String::new(),
            reports: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// User prompts sent for synthesis, in order.
    pub fn synthesis_prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(system, _)| !is_planner(system))
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    pub fn decomposition_prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(system, _)| is_planner(system))
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

fn is_planner(system: &str) -> bool {
    system.contains("research planner")
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .push((system.to_string(), prompt.to_string()));
        if self.should_fail {
            return Err(AppError::external("llm", "Mock LLM failure"));
        }
        if is_planner(system) {
            return Ok(self.plan.clone());
        }
        let mut reports = self.reports.lock();
        let report = if reports.len() > 1 {
            reports.pop_front()
        } else {
            reports.front().cloned()
        };
        Ok(report.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Returns the same fixed hits for every query.
pub struct MockSearch {
    urls: Vec<String>,
    calls: AtomicUsize,
    should_fail: bool,
}

impl MockSearch {
    pub fn new(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            urls: Vec::new(),
            calls: AtomicUsize::new(0),
            should_fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchService for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(AppError::external("search", "rate limited"));
        }
        Ok(self
            .urls
            .iter()
            .take(max_results)
            .map(|url| SearchHit {
                url: url.clone(),
                title: format!("Result for {}", query),
                snippet: format!("Snippet about {}", query),
                score: None,
                published_date: None,
            })
            .collect())
    }
}

/// Serves a long synthetic article for every url, or fails every fetch.
pub struct MockScraper {
    calls: AtomicUsize,
    should_fail: bool,
}

impl MockScraper {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            should_fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn article(url: &str) -> String {
    let mut text = format!("This article at {} discusses solid-state batteries. ", url);
    for i in 0..12 {
        text.push_str(&format!(
            "Paragraph {} covers electrolyte cost, manufacturing yield and cell safety in detail. ",
            i
        ));
    }
    text
}

#[async_trait]
impl ScrapeService for MockScraper {
    async fn fetch(&self, url: &str) -> std::result::Result<ScrapedContent, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ScrapeError::Http { status: 503 });
        }
        let text = article(url);
        Ok(ScrapedContent {
            url: url.to_string(),
            title: format!("Article {}", url),
            word_count: text.split_whitespace().count(),
            text,
        })
    }
}

/// Deterministic bag-of-words embedding into a small fixed space.
pub struct HashEmbedder;

pub const HASH_DIMENSIONS: usize = 32;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; HASH_DIMENSIONS];
                for word in text.split_whitespace() {
                    let bucket = word
                        .to_lowercase()
                        .bytes()
                        .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
                    v[bucket % HASH_DIMENSIONS] += 1.0;
                }
                v
            })
            .collect())
    }
}

pub fn evidence_store() -> VectorEvidenceStore {
    VectorEvidenceStore::new(
        Arc::new(HashEmbedder),
        Arc::new(InMemoryVectorStore::new()),
        "research",
    )
}

/// Services backed by the given fakes, in-memory storage and an exporter in `report_dir`.
pub fn services(
    llm: Arc<MockLLMClient>,
    search: Arc<MockSearch>,
    scraper: Arc<MockScraper>,
    report_dir: &Path,
) -> ResearchServices {
    ResearchServices {
        llm,
        search,
        scraper,
        evidence: Arc::new(evidence_store()),
        checkpoints: Arc::new(InMemoryCheckpointStore::new()),
        exporter: Some(ReportExporter::new(report_dir)),
    }
}

pub fn config(max_iterations: u32) -> ResearchConfig {
    let mut config = ResearchConfig::default();
    config.workflow.max_iterations = max_iterations;
    config.index.in_memory = true;
    config
}

pub const URLS: &[&str] = &[
    "https://a.example/cost",
    "https://b.example/manufacturing",
    "https://c.example/safety",
];
