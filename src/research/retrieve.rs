//! Retrieval: query the evidence store and rank what comes back.

use super::models::{Priority, RetrievedChunk};
use super::state::{ResearchState, StateUpdate};
use crate::db::evidence::EvidenceStore;
use crate::types::Result;
use crate::utils::text::prefix_key;
use crate::utils::toml_config::RetrievalConfig;
use futures::future::join_all;
use std::collections::HashSet;

/// The question, every high-priority sub-query, the first few medium ones,
/// and the reviewer's feedback on a revision pass.
pub fn build_queries(state: &ResearchState, config: &RetrievalConfig) -> Vec<String> {
    let high = state
        .sub_queries
        .iter()
        .filter(|sq| sq.priority == Priority::High);
    let medium = state
        .sub_queries
        .iter()
        .filter(|sq| sq.priority == Priority::Medium)
        .take(config.max_medium_queries);

    let mut queries: Vec<String> = std::iter::once(state.question.trim().to_string())
        .chain(high.chain(medium).map(|sq| sq.query.trim().to_string()))
        .collect();

    if let Some(feedback) = state.revision_feedback() {
        queries.push(feedback.revision_text());
    }

    let mut seen = HashSet::new();
    queries.retain(|q| !q.is_empty() && seen.insert(q.clone()));
    queries
}

/// Drop short chunks, sort by score, keep the best chunk per leading-text
/// prefix and cap the list.
pub fn rank_chunks(mut chunks: Vec<RetrievedChunk>, config: &RetrievalConfig) -> Vec<RetrievedChunk> {
    chunks.retain(|c| c.text.trim().chars().count() >= config.min_chunk_chars);
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    chunks.retain(|c| seen.insert(prefix_key(&c.text, config.dedup_prefix_chars)));
    chunks.truncate(config.max_chunks);
    chunks
}

/// Replace the retrieved chunk list with a fresh ranked result.
pub async fn retrieve(
    state: &ResearchState,
    store: &dyn EvidenceStore,
    config: &RetrievalConfig,
) -> Result<StateUpdate> {
    let mut update = StateUpdate::new();

    let available = match store.count().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "Evidence store count failed");
            update.push_error(format!("retrieve: {}", e));
            0
        }
    };
    if available == 0 {
        tracing::info!("Evidence store is empty, nothing to retrieve");
        update.retrieved_chunks = Some(Vec::new());
        return Ok(update);
    }

    let queries = build_queries(state, config);
    let responses = join_all(queries.iter().map(|q| store.query(q, config.per_query_k))).await;

    let mut candidates = Vec::new();
    for (query, response) in queries.iter().zip(responses) {
        match response {
            Ok(matches) => candidates.extend(matches.into_iter().map(|m| RetrievedChunk {
                text: m.text,
                metadata: m.metadata,
                score: m.similarity.relevance(),
            })),
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "Evidence query failed");
                update.push_error(format!("retrieve '{}': {}", query, e));
            }
        }
    }

    let total = candidates.len();
    let ranked = rank_chunks(candidates, config);
    tracing::debug!(queries = queries.len(), candidates = total, "Merged retrieval results");
    tracing::info!(chunks = ranked.len(), "Retrieval complete");

    update.retrieved_chunks = Some(ranked);
    Ok(update)
}
