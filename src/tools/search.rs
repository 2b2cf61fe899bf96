//! Web search adapter
//!
//! [`SearchService`] is the narrow contract the gathering stage depends on.
//! [`DaedraSearch`] implements it with the daedra crate, which uses
//! DuckDuckGo as the search backend.

use crate::types::{AppError, Result};
use async_trait::async_trait;

/// One normalized hit returned by a search backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Native relevance score, if the backend reports one.
    pub score: Option<f32>,
    pub published_date: Option<String>,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Run one query and return at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Relevance for a hit at zero-based `rank` when the backend gives none.
pub fn rank_score(rank: usize) -> f32 {
    (1.0 - 0.1 * rank as f32).max(0.1)
}

/// Web search powered by daedra
pub struct DaedraSearch;

impl DaedraSearch {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DaedraSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchService for DaedraSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Empty search query".to_string()));
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::external("search", e))?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|r| SearchHit {
                url: r.url.clone(),
                title: r.title.clone(),
                snippet: r.description.clone(),
                score: None,
                published_date: None,
            })
            .collect())
    }
}
