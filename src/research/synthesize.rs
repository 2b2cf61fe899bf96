//! Synthesis: turn retrieved evidence into a cited draft report.

use super::models::{Citation, Report, ReportMetadata, ReportSection, RetrievedChunk, SearchResult};
use super::parse::extract_json;
use super::state::{ResearchState, StateUpdate};
use crate::llm::LLMClient;
use crate::types::{AppError, Result};
use crate::utils::text::truncate_chars;
use crate::utils::toml_config::SynthesisConfig;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

const QUOTE_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a careful research analyst. You write structured reports \
grounded only in the evidence provided, citing sources by their numeric id. Respond with a \
single JSON object and nothing else.";

/// Fields the model is trusted to write. Citations and metadata are computed here.
#[derive(Debug, Deserialize)]
struct DraftReport {
    title: String,
    #[serde(alias = "executiveSummary", alias = "summary")]
    executive_summary: String,
    sections: Vec<ReportSection>,
    #[serde(default)]
    conclusions: String,
}

/// Assign ids 1..K by first appearance: retrieved chunk sources first, then
/// the leading search results that were not retrieved.
pub fn build_citations(
    chunks: &[RetrievedChunk],
    search_results: &[SearchResult],
    search_limit: usize,
) -> Vec<Citation> {
    let mut citations: Vec<Citation> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for chunk in chunks {
        let url = chunk.metadata.source_url.as_str();
        if seen.insert(url) {
            citations.push(Citation {
                id: citations.len() + 1,
                url: url.to_string(),
                title: chunk.metadata.source_title.clone(),
                quote: Some(truncate_chars(chunk.text.trim(), QUOTE_CHARS)),
            });
        }
    }

    for result in search_results.iter().take(search_limit) {
        if seen.insert(result.url.as_str()) {
            citations.push(Citation {
                id: citations.len() + 1,
                url: result.url.clone(),
                title: result.title.clone(),
                quote: None,
            });
        }
    }

    citations
}

fn build_prompt(state: &ResearchState, citations: &[Citation], config: &SynthesisConfig) -> String {
    let ids: HashMap<&str, usize> = citations.iter().map(|c| (c.url.as_str(), c.id)).collect();
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Research question: {}\n", state.question.trim());

    prompt.push_str("Sources:\n");
    for citation in citations {
        let _ = writeln!(prompt, "[{}] {} ({})", citation.id, citation.title, citation.url);
    }

    prompt.push_str("\nEvidence:\n");
    for chunk in state.retrieved_chunks.iter().take(config.prompt_chunks) {
        let id = ids.get(chunk.metadata.source_url.as_str()).copied().unwrap_or(0);
        let _ = writeln!(
            prompt,
            "[{}] {}\n",
            id,
            truncate_chars(chunk.text.trim(), config.chunk_excerpt_chars)
        );
    }

    if let Some(feedback) = state.revision_feedback() {
        prompt.push_str("Reviewer feedback on the previous draft, address all of it:\n");
        prompt.push_str(&feedback.revision_text());
        prompt.push_str("\n\n");
    }

    prompt.push_str(
        r#"Write the report as JSON with this shape:
{"title": "...", "executive_summary": "...", "sections": [{"title": "...", "body": "...", "citations": [1, 2]}], "conclusions": "..."}
Cite only the source ids listed above."#,
    );

    prompt
}

fn parse_report(
    response: &str,
    state: &ResearchState,
    citations: Vec<Citation>,
) -> Result<Report> {
    let draft: DraftReport =
        extract_json(response).map_err(|e| AppError::SynthesisParse(e.to_string()))?;

    if draft.title.trim().is_empty() {
        return Err(AppError::SynthesisParse("report title is empty".to_string()));
    }
    if draft.sections.is_empty() {
        return Err(AppError::SynthesisParse("report has no sections".to_string()));
    }

    let known: HashSet<usize> = citations.iter().map(|c| c.id).collect();
    let sections = draft
        .sections
        .into_iter()
        .map(|mut section| {
            let mut seen = HashSet::new();
            section
                .citations
                .retain(|id| known.contains(id) && seen.insert(*id));
            section
        })
        .collect();

    Ok(Report {
        title: draft.title.trim().to_string(),
        executive_summary: draft.executive_summary,
        sections,
        conclusions: draft.conclusions,
        metadata: ReportMetadata {
            source_count: citations.len(),
            sub_query_count: state.sub_queries.len(),
            generated_at: Utc::now(),
            iteration_count: state.iteration,
        },
        citations,
    })
}

/// Produce a draft report from the current retrieval result.
///
/// Fails the pass when there is no evidence, when the model call fails, or
/// when the response cannot be read as a report.
pub async fn synthesize(
    state: &ResearchState,
    llm: &dyn LLMClient,
    config: &SynthesisConfig,
) -> Result<StateUpdate> {
    if state.retrieved_chunks.is_empty() {
        return Err(AppError::StageFailed(
            "no retrieved chunks to synthesize".to_string(),
        ));
    }

    let citations = build_citations(
        &state.retrieved_chunks,
        &state.search_results,
        config.search_citations,
    );
    let prompt = build_prompt(state, &citations, config);
    tracing::debug!(
        citations = citations.len(),
        prompt_chars = prompt.len(),
        "Synthesizing report"
    );

    let response = llm.generate_with_system(SYSTEM_PROMPT, &prompt).await?;
    let report = parse_report(&response, state, citations)?;

    tracing::info!(
        title = %report.title,
        sections = report.sections.len(),
        sources = report.metadata.source_count,
        "Draft report ready"
    );

    let mut update = StateUpdate::new();
    update.draft_report = Some(Some(report));
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::{ChunkMetadata, HumanFeedback};

    fn chunk(url: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source_url: url.to_string(),
                source_title: format!("Title {}", url),
                sub_query_id: None,
                position: 0,
            },
            score: 0.8,
        }
    }

    fn result(url: &str) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: format!("Result {}", url),
            snippet: String::new(),
            score: 0.5,
            published_date: None,
            sub_query_id: None,
        }
    }

    #[test]
    fn test_citations_contiguous_chunks_first() {
        let chunks = vec![chunk("https://b", "b1"), chunk("https://a", "a1"), chunk("https://b", "b2")];
        let results = vec![result("https://a"), result("https://c"), result("https://d")];

        let citations = build_citations(&chunks, &results, 2);
        let urls: Vec<&str> = citations.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://b", "https://a", "https://c"]);
        let ids: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(citations[0].quote.as_deref(), Some("b1"));
        assert!(citations[2].quote.is_none());
    }

    #[test]
    fn test_parse_report_overwrites_metadata_and_filters_ids() {
        let mut state = ResearchState::new("q");
        state.iteration = 2;
        state.sub_queries = vec![
            crate::research::models::SubQuery::new("a", "", crate::research::models::Priority::High),
        ];
        let citations = build_citations(&[chunk("https://a", "text")], &[], 0);
        let raw = r#"```json
{"title": "T", "executive_summary": "S",
 "sections": [{"title": "One", "body": "B", "citations": [1, 7, 1]}],
 "citations": [{"id": 9, "url": "https://made-up", "title": "x"}],
 "metadata": {"sourceCount": 99}}
```"#;

        let report = parse_report(raw, &state, citations).unwrap();
        assert_eq!(report.sections[0].citations, vec![1]);
        assert_eq!(report.citations.len(), 1);
        assert_eq!(report.citations[0].url, "https://a");
        assert_eq!(report.metadata.source_count, 1);
        assert_eq!(report.metadata.sub_query_count, 1);
        assert_eq!(report.metadata.iteration_count, 2);
    }

    #[test]
    fn test_parse_report_requires_fields() {
        let state = ResearchState::new("q");
        let missing_sections = r#"{"title": "T", "executive_summary": "S"}"#;
        assert!(matches!(
            parse_report(missing_sections, &state, Vec::new()),
            Err(AppError::SynthesisParse(_))
        ));
        assert!(matches!(
            parse_report("no json here", &state, Vec::new()),
            Err(AppError::SynthesisParse(_))
        ));
    }

    #[test]
    fn test_prompt_includes_feedback_and_caps_chunks() {
        let mut state = ResearchState::new("What is X?");
        state.retrieved_chunks = (0..20)
            .map(|i| chunk(&format!("https://s{}", i), &format!("evidence-{}", i)))
            .collect();
        state.feedback = Some(HumanFeedback::reject("add more detail on Y", vec![]));
        let config = SynthesisConfig::default();
        let citations = build_citations(&state.retrieved_chunks, &[], 0);

        let prompt = build_prompt(&state, &citations, &config);
        assert!(prompt.contains("add more detail on Y"));
        assert!(prompt.contains("evidence-14"));
        assert!(!prompt.contains("evidence-15"));
        assert!(prompt.contains("[20] Title https://s19"));
    }

    #[tokio::test]
    async fn test_synthesize_without_chunks_fails() {
        struct Unused;
        #[async_trait::async_trait]
        impl LLMClient for Unused {
            async fn generate_with_system(&self, _: &str, _: &str) -> Result<String> {
                panic!("model must not be called");
            }
            fn model_name(&self) -> &str {
                "unused"
            }
        }

        let result = synthesize(&ResearchState::new("q"), &Unused, &SynthesisConfig::default()).await;
        assert!(matches!(result, Err(AppError::StageFailed(_))));
    }
}
