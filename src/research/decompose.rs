//! Question decomposition into prioritized sub-queries.

use super::models::{Priority, SubQuery};
use super::parse::extract_json;
use super::state::{ResearchState, StateUpdate};
use crate::llm::LLMClient;
use crate::types::{AppError, Result};
use serde::Deserialize;

pub const MIN_SUB_QUERIES: usize = 3;
pub const MAX_SUB_QUERIES: usize = 6;

const SYSTEM_PROMPT: &str = "You are a research planner. You break a research question into \
focused, independently searchable web queries. Respond with JSON only.";

#[derive(Debug, Deserialize)]
struct Plan {
    sub_queries: Vec<PlannedQuery>,
}

#[derive(Debug, Deserialize)]
struct PlannedQuery {
    query: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    priority: String,
}

fn build_prompt(state: &ResearchState) -> String {
    let mut prompt = format!(
        r#"Research question: {question}

Generate between {min} and {max} search queries that together cover the question.
Mark each one "high", "medium" or "low" priority.

Return a JSON object shaped like:
{{"sub_queries": [{{"query": "...", "rationale": "...", "priority": "high"}}]}}"#,
        question = state.question.trim(),
        min = MIN_SUB_QUERIES,
        max = MAX_SUB_QUERIES,
    );

    if let Some(feedback) = state.revision_feedback() {
        prompt.push_str("\n\nA reviewer rejected the previous report. Their feedback:\n");
        prompt.push_str(&feedback.revision_text());
        prompt.push_str("\n\nFocus the new queries on what the feedback asks for.");
        if !state.sub_queries.is_empty() {
            prompt.push_str("\n\nPrevious queries:\n");
            for sq in &state.sub_queries {
                prompt.push_str("- ");
                prompt.push_str(&sq.query);
                prompt.push('\n');
            }
        }
    }

    prompt
}

/// Strip a leading `1.`, `2)`, `-`, `*` or `•` marker. Lines without one are
/// not list items.
fn strip_list_marker(line: &str) -> Option<&str> {
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = if digits > 0 {
        line[digits..]
            .strip_prefix('.')
            .or_else(|| line[digits..].strip_prefix(')'))?
    } else {
        line.strip_prefix(['-', '*', '•'])?
    };
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

/// Numbered-list fallback for models that ignore the JSON instruction.
fn parse_lines(response: &str) -> Vec<SubQuery> {
    response
        .lines()
        .filter_map(|line| strip_list_marker(line.trim()))
        .filter(|item| {
            item.chars().any(char::is_alphanumeric)
                && !item.starts_with(['"', '[', ']', '{', '}'])
        })
        .map(|item| SubQuery::new(item, "", Priority::Medium))
        .collect()
}

fn parse_response(response: &str) -> Vec<SubQuery> {
    match extract_json::<Plan>(response) {
        Ok(plan) => plan
            .sub_queries
            .into_iter()
            .filter(|q| !q.query.trim().is_empty())
            .map(|q| {
                SubQuery::new(
                    q.query.trim(),
                    q.rationale.trim(),
                    Priority::parse_lenient(&q.priority),
                )
            })
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Decomposition output was not JSON, reading lines");
            parse_lines(response)
        }
    }
}

/// Produce this pass's sub-queries and bump the iteration counter.
///
/// A model failure is advisory here: the sub-query list comes back empty and
/// the search stage turns that into a stage failure.
pub async fn decompose(state: &ResearchState, llm: &dyn LLMClient) -> Result<StateUpdate> {
    if state.question.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "research question must not be empty".to_string(),
        ));
    }

    let iteration = state.iteration + 1;
    let mut update = StateUpdate::new();
    update.iteration = Some(iteration);

    let prompt = build_prompt(state);
    tracing::debug!(iteration, prompt_chars = prompt.len(), "Decomposing question");

    let mut sub_queries = match llm.generate_with_system(SYSTEM_PROMPT, &prompt).await {
        Ok(response) => parse_response(&response),
        Err(e) => {
            tracing::warn!(error = %e, "Decomposition call failed");
            update.push_error(format!("decompose: {}", e));
            Vec::new()
        }
    };

    if sub_queries.len() > MAX_SUB_QUERIES {
        sub_queries.truncate(MAX_SUB_QUERIES);
    }
    if sub_queries.is_empty() {
        update.push_error("decompose: model produced no sub-queries");
    } else if sub_queries.len() < MIN_SUB_QUERIES {
        tracing::warn!(count = sub_queries.len(), "Fewer sub-queries than requested");
    }

    tracing::info!(iteration, count = sub_queries.len(), "Decomposition complete");
    update.sub_queries = Some(sub_queries);
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::models::HumanFeedback;

    #[test]
    fn test_parse_json_plan() {
        let raw = r#"```json
{"sub_queries": [
  {"query": "rust async runtimes", "rationale": "core", "priority": "high"},
  {"query": "tokio vs async-std", "priority": "LOW"},
  {"query": "  ", "priority": "high"}
]}
```"#;
        let queries = parse_response(raw);
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].priority, Priority::High);
        assert_eq!(queries[1].priority, Priority::Low);
        assert_ne!(queries[0].id, queries[1].id);
    }

    #[test]
    fn test_parse_numbered_lines() {
        let queries = parse_response("1. first query\n2) second query\n\n- third query");
        let texts: Vec<&str> = queries.iter().map(|q| q.query.as_str()).collect();
        assert_eq!(texts, vec!["first query", "second query", "third query"]);
        assert!(queries.iter().all(|q| q.priority == Priority::Medium));
    }

    #[test]
    fn test_misshapen_json_yields_no_queries() {
        let raw = "Here are the queries:\n{\n  \"queries\": [\n    \"battery cost\",\n    \"battery safety\"\n  ]\n}";
        assert!(parse_response(raw).is_empty());
    }

    #[test]
    fn test_lines_need_a_list_marker() {
        let raw = "Sure! Here is a plan.\n\n1. solid-state electrolyte cost\n2024 was a big year\n* ---\n- \"quoted\"\n-no space\n3) cell safety data";
        let texts: Vec<String> = parse_response(raw).into_iter().map(|q| q.query).collect();
        assert_eq!(texts, vec!["solid-state electrolyte cost", "cell safety data"]);
    }

    #[test]
    fn test_revision_prompt_contains_feedback() {
        let mut state = ResearchState::new("What is X?");
        state.feedback = Some(HumanFeedback::reject(
            "add more detail on Y",
            vec!["cite primary sources".into()],
        ));
        let prompt = build_prompt(&state);
        assert!(prompt.contains("add more detail on Y"));
        assert!(prompt.contains("- cite primary sources"));
    }

    #[test]
    fn test_first_pass_prompt_has_no_feedback_section() {
        let prompt = build_prompt(&ResearchState::new("What is X?"));
        assert!(!prompt.contains("reviewer"));
    }
}
