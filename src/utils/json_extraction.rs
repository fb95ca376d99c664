//! JSON extraction from raw LLM responses.
//!
//! Models are asked to reply with raw JSON, but real completions arrive
//! wrapped in markdown fences, preceded by prose, or cut off mid-object.
//! This module pulls the first complete JSON object out of such text and
//! reports truncation distinctly from absence, so callers can log a useful
//! reason before retrying.
//!
//! Extraction strategies, tried in order:
//! 1. Content that already starts with `{`
//! 2. A ```json fenced block
//! 3. A generic ``` fenced block
//! 4. Brace matching from the first `{` anywhere in the content
//!
//! ```
//! use social_forge::utils::json_extraction::extract_json_object;
//!
//! let response = "Sure! Here it is: {\"USERS\": []}";
//! let json = extract_json_object(response).into_result().unwrap();
//! assert_eq!(json, "{\"USERS\": []}");
//! ```

use regex::Regex;
use thiserror::Error;

/// Error type for JSON extraction failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JsonExtractionError {
    #[error("JSON appears truncated ({unclosed} unclosed braces): {preview}...")]
    Truncated { preview: String, unclosed: usize },

    #[error("No JSON object found in response starting with: '{preview}'")]
    NotFound { preview: String },
}

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtraction {
    /// A complete JSON object was found.
    Found(String),
    /// An object opened but never closed; carries the partial text.
    Truncated { partial: String, unclosed: usize },
    /// No object-like content at all.
    NotFound,
}

impl JsonExtraction {
    /// Converts into a `Result`, building previews for the error cases.
    pub fn into_result(self) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtraction::Found(json) => Ok(json),
            JsonExtraction::Truncated { partial, unclosed } => {
                Err(JsonExtractionError::Truncated {
                    preview: preview_of(&partial),
                    unclosed,
                })
            }
            JsonExtraction::NotFound => Err(JsonExtractionError::NotFound {
                preview: String::new(),
            }),
        }
    }

    /// As [`into_result`](Self::into_result), but the NotFound preview shows
    /// the start of the original response instead of being empty.
    pub fn into_result_with_context(self, content: &str) -> Result<String, JsonExtractionError> {
        match self {
            JsonExtraction::NotFound => Err(JsonExtractionError::NotFound {
                preview: preview_of(content),
            }),
            other => other.into_result(),
        }
    }
}

fn preview_of(s: &str) -> String {
    const PREVIEW_LEN: usize = 80;
    let trimmed = s.trim();
    trimmed.chars().take(PREVIEW_LEN).collect()
}

/// Extracts the first complete JSON object from raw model output.
pub fn extract_json_object(content: &str) -> JsonExtraction {
    let trimmed = content.trim();

    // Direct JSON
    if trimmed.starts_with('{') {
        return match_from(trimmed);
    }

    // ```json fenced block
    if let Some(block) = fenced_block(trimmed) {
        if let Some(start) = block.find('{') {
            return match_from(&block[start..]);
        }
    }

    // First '{' anywhere
    if let Some(start) = trimmed.find('{') {
        return match_from(&trimmed[start..]);
    }

    JsonExtraction::NotFound
}

/// Brace-matches from the start of `s` (which begins with '{').
fn match_from(s: &str) -> JsonExtraction {
    match find_matching_brace(s) {
        Some(end) => JsonExtraction::Found(s[..=end].to_string()),
        None => JsonExtraction::Truncated {
            partial: s.to_string(),
            unclosed: count_unclosed_braces(s),
        },
    }
}

/// Returns the content of the first fenced code block, if any.
fn fenced_block(content: &str) -> Option<String> {
    // Language tag after the opening fence is optional
    let re = Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid regex");
    re.captures(content)
        .map(|caps| caps[1].trim().to_string())
}

/// Finds the index of the closing brace matching the opening brace at the
/// start of `s`, respecting string literals and escapes.
pub fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

/// Counts braces opened outside string literals and never closed.
fn count_unclosed_braces(s: &str) -> usize {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for c in s.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_json() {
        let result = extract_json_object(r#"{"POST": "hello"}"#);
        assert_eq!(result, JsonExtraction::Found(r#"{"POST": "hello"}"#.to_string()));
    }

    #[test]
    fn test_json_with_leading_prose() {
        let result = extract_json_object(r#"Here is the script: {"SCRIPT": []} done"#);
        assert_eq!(result, JsonExtraction::Found(r#"{"SCRIPT": []}"#.to_string()));
    }

    #[test]
    fn test_json_fenced_block() {
        let content = "```json\n{\"USERS\": [{\"USERNAME\": \"a\"}]}\n```";
        let result = extract_json_object(content);
        assert_eq!(
            result,
            JsonExtraction::Found("{\"USERS\": [{\"USERNAME\": \"a\"}]}".to_string())
        );
    }

    #[test]
    fn test_generic_fenced_block() {
        let content = "Model output below.\n```\n{\"RESULT\": false}\n```";
        let result = extract_json_object(content);
        assert_eq!(result, JsonExtraction::Found("{\"RESULT\": false}".to_string()));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let content = r#"{"POST": "use {braces} freely \" } here"}"#;
        let result = extract_json_object(content);
        assert_eq!(result, JsonExtraction::Found(content.to_string()));
    }

    #[test]
    fn test_truncated_object() {
        let result = extract_json_object(r#"{"USERS": [{"USERNAME": "a""#);
        match result {
            JsonExtraction::Truncated { unclosed, .. } => assert_eq!(unclosed, 2),
            other => panic!("expected Truncated, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found() {
        assert_eq!(extract_json_object("no json here"), JsonExtraction::NotFound);
        assert!(extract_json_object("").into_result().is_err());
    }

    #[test]
    fn test_into_result_with_context_preview() {
        let err = extract_json_object("plain text answer")
            .into_result_with_context("plain text answer")
            .unwrap_err();
        match err {
            JsonExtractionError::NotFound { preview } => {
                assert!(preview.starts_with("plain text"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_objects() {
        let content = r#"{"FEATURES": {"TOXICITY": "low", "SENTIMENT": "positive"}}"#;
        let result = extract_json_object(content);
        assert_eq!(result, JsonExtraction::Found(content.to_string()));
    }
}
