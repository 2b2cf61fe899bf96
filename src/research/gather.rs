//! Evidence gathering: web search per sub-query, then page scraping.
//!
//! Both stages tolerate partial failure. A failed search or fetch is logged
//! into the session's error list and the item is skipped.

use super::models::{ScrapedPage, SearchResult, SubQuery};
use super::state::{ResearchState, StateUpdate};
use crate::tools::scrape::{ScrapeError, ScrapeService};
use crate::tools::search::{rank_score, SearchService};
use crate::utils::toml_config::{ScrapeConfig, SearchConfig};
use crate::types::{AppError, Result};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;

/// Search every sub-query, highest priority tier first.
///
/// Calls within a tier run concurrently. Their results are then merged in
/// sub-query order against the cumulative url set, so a url is only ever
/// attributed to the first sub-query that surfaced it.
pub async fn search(
    state: &ResearchState,
    search: &dyn SearchService,
    config: &SearchConfig,
) -> Result<StateUpdate> {
    if state.sub_queries.is_empty() {
        return Err(AppError::StageFailed("no sub-queries to search".to_string()));
    }

    let mut ordered: Vec<&SubQuery> = state.sub_queries.iter().collect();
    ordered.sort_by_key(|sq| sq.priority);

    let mut seen: HashSet<String> = state
        .known_search_urls()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mut update = StateUpdate::new();
    let mut added = Vec::new();
    let mut duplicates = 0usize;

    for tier in ordered.chunk_by(|a, b| a.priority == b.priority) {
        let responses = join_all(
            tier.iter()
                .map(|sq| search.search(&sq.query, config.results_per_query)),
        )
        .await;

        for (sub_query, response) in tier.iter().zip(responses) {
            let hits = match response {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(query = %sub_query.query, error = %e, "Search failed");
                    update.push_error(format!("search '{}': {}", sub_query.query, e));
                    continue;
                }
            };

            for (rank, hit) in hits.into_iter().enumerate() {
                if hit.url.trim().is_empty() || !seen.insert(hit.url.clone()) {
                    duplicates += 1;
                    continue;
                }
                let score = hit
                    .score
                    .filter(|s| s.is_finite())
                    .map(|s| s.clamp(0.0, 1.0))
                    .unwrap_or_else(|| rank_score(rank));
                added.push(SearchResult {
                    url: hit.url,
                    title: hit.title,
                    snippet: hit.snippet,
                    score,
                    published_date: hit.published_date,
                    sub_query_id: Some(sub_query.id.clone()),
                });
            }
        }
    }

    tracing::info!(new_urls = added.len(), duplicates, "Search complete");
    update.search_results = Some(added);
    Ok(update)
}

/// Fetch the highest-scoring not-yet-scraped results in fixed-size batches.
///
/// A batch fully resolves before the next one starts. Pages that fail, time
/// out or come back too short are dropped.
pub async fn scrape(
    state: &ResearchState,
    scraper: &dyn ScrapeService,
    config: &ScrapeConfig,
) -> Result<StateUpdate> {
    let scraped = state.scraped_urls();
    let mut candidates: Vec<&SearchResult> = state
        .search_results
        .iter()
        .filter(|r| !scraped.contains(r.url.as_str()))
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(config.max_pages);

    let mut update = StateUpdate::new();
    let mut pages = Vec::new();
    let timeout = config.timeout();

    for batch in candidates.chunks(config.concurrency.max(1)) {
        let fetches = batch.iter().map(|result| async move {
            match tokio::time::timeout(timeout, scraper.fetch(&result.url)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ScrapeError::Timeout),
            }
        });
        let outcomes = join_all(fetches).await;

        for (result, outcome) in batch.iter().zip(outcomes) {
            match outcome {
                Ok(content) => {
                    let title = if content.title.is_empty() || content.title == result.url {
                        result.title.clone()
                    } else {
                        content.title
                    };
                    let page = ScrapedPage {
                        url: result.url.clone(),
                        title,
                        content: content.text,
                        word_count: content.word_count,
                        error: None,
                        scraped_at: Utc::now(),
                        sub_query_id: result.sub_query_id.clone(),
                    };
                    if page.is_successful(config.min_words) {
                        pages.push(page);
                    } else {
                        tracing::debug!(
                            url = %result.url,
                            words = page.word_count,
                            "Page too short, dropped"
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %result.url, error = %e, "Scrape failed");
                    update.push_error(format!("scrape {}: {}", result.url, e));
                }
            }
        }
    }

    tracing::info!(
        attempted = candidates.len(),
        succeeded = pages.len(),
        "Scrape complete"
    );
    update.scraped_pages = Some(pages);
    Ok(update)
}
