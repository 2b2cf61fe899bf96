//! Indexing: chunk newly scraped pages and persist them as evidence.

use super::models::{ChunkMetadata, StoredChunkRef};
use super::state::{ResearchState, StateUpdate};
use crate::db::evidence::EvidenceStore;
use crate::rag::chunker::TextChunker;
use crate::types::Result;

/// Chunk and store every scraped page that has no stored chunks yet.
///
/// Each page is one store call, so a failed write only loses that page.
pub async fn index(
    state: &ResearchState,
    store: &dyn EvidenceStore,
    chunker: &TextChunker,
) -> Result<StateUpdate> {
    let indexed = state.indexed_urls();
    let mut update = StateUpdate::new();
    let mut stored = Vec::new();
    let mut pages = 0usize;

    for page in state
        .scraped_pages
        .iter()
        .filter(|p| !indexed.contains(p.url.as_str()))
    {
        let chunks = chunker.chunk(&page.content);
        if chunks.is_empty() {
            tracing::debug!(url = %page.url, "No windows long enough to index");
            continue;
        }

        let (texts, metadata): (Vec<String>, Vec<ChunkMetadata>) = chunks
            .into_iter()
            .map(|chunk| {
                let meta = ChunkMetadata {
                    source_url: page.url.clone(),
                    source_title: page.title.clone(),
                    sub_query_id: page.sub_query_id.clone(),
                    position: chunk.position,
                };
                (chunk.text, meta)
            })
            .unzip();

        match store.store(&texts, &metadata).await {
            Ok(ids) => {
                pages += 1;
                stored.extend(
                    ids.into_iter()
                        .zip(metadata)
                        .map(|(id, metadata)| StoredChunkRef { id, metadata }),
                );
            }
            Err(e) => {
                tracing::warn!(url = %page.url, error = %e, "Indexing failed");
                update.push_error(format!("index {}: {}", page.url, e));
            }
        }
    }

    tracing::info!(pages, chunks = stored.len(), "Indexing complete");
    update.stored_chunks = Some(stored);
    Ok(update)
}
