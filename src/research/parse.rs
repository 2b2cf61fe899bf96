//! Structured-output extraction from model responses.
//!
//! Accepted forms, tried in order:
//!
//! 1. the whole response is a JSON document
//! 2. a fenced code block (` ```json ` or bare ` ``` `) holding JSON
//! 3. the first top-level `{ ... }` object in the text
//!
//! A candidate only counts if it also deserializes into the target type.

use serde::de::DeserializeOwned;

/// The single failure mode: no form yielded a valid document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no valid JSON document in model output ({reason})")]
pub struct ExtractError {
    pub reason: String,
}

pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractError> {
    let mut last_error = String::from("empty response");

    let candidates = std::iter::once(raw.trim())
        .chain(fenced_blocks(raw))
        .chain(first_object(raw));

    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(ExtractError { reason: last_error })
}

/// Bodies of fenced code blocks whose info string is empty or `json`.
fn fenced_blocks(raw: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find("```") {
        let after_fence = &rest[open + 3..];
        let Some(line_end) = after_fence.find('\n') else {
            break;
        };
        let info = after_fence[..line_end].trim();
        let body = &after_fence[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };

        if info.is_empty() || info.eq_ignore_ascii_case("json") {
            blocks.push(body[..close].trim());
        }
        rest = &body[close + 3..];
    }

    blocks
}

/// The first balanced `{ ... }` span, skipping braces inside strings.
fn first_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Doc {
        title: String,
    }

    #[test]
    fn test_bare_json() {
        let doc: Doc = extract_json(r#"  {"title": "A"}  "#).unwrap();
        assert_eq!(doc.title, "A");
    }

    #[test]
    fn test_fenced_json() {
        let raw = "Here you go:\n```json\n{\"title\": \"B\"}\n```\nThanks";
        let doc: Doc = extract_json(raw).unwrap();
        assert_eq!(doc.title, "B");
    }

    #[test]
    fn test_fence_with_other_language_is_skipped() {
        let raw = "```python\nprint('{')\n```\n```\n{\"title\": \"C\"}\n```";
        let doc: Doc = extract_json(raw).unwrap();
        assert_eq!(doc.title, "C");
    }

    #[test]
    fn test_first_brace_object_with_braces_in_strings() {
        let raw = r#"Sure! {"title": "has } brace \" and quote"} trailing {"title": "no"}"#;
        let doc: Doc = extract_json(raw).unwrap();
        assert_eq!(doc.title, "has } brace \" and quote");
    }

    #[test]
    fn test_schema_mismatch_fails() {
        let result: Result<Doc, _> = extract_json(r#"{"heading": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_json_fails() {
        let result: Result<Doc, _> = extract_json("I could not produce a report.");
        let err = result.unwrap_err();
        assert!(err.to_string().starts_with("no valid JSON document"));
    }

    #[test]
    fn test_unbalanced_object_fails() {
        let result: Result<Doc, _> = extract_json(r#"{"title": "x""#);
        assert!(result.is_err());
    }
}
