//! Extraction of JSON payloads from model message content.

use crate::errors::CompletionError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

#[allow(clippy::expect_used)]
fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("fence pattern is valid")
    })
}

/// Parses message content as JSON.
///
/// Content wrapped in a Markdown code fence is unwrapped first. If the text
/// still is not valid JSON, the outermost `{ ... }` span is tried before
/// giving up.
///
/// # Errors
///
/// Returns [`CompletionError::EmptyResponse`] for blank content and
/// [`CompletionError::Parse`] when no JSON object can be recovered.
pub fn extract_json(content: &str) -> Result<Value, CompletionError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CompletionError::EmptyResponse);
    }

    let body = fence_pattern()
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        Err(first) => {
            let start = body.find('{');
            let end = body.rfind('}');
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str::<Value>(&body[start..=end])
                        .map_err(|e| CompletionError::parse(e.to_string()))
                }
                _ => Err(CompletionError::parse(first.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let value = extract_json(r#"{"provider": "aws"}"#).unwrap();
        assert_eq!(value["provider"], "aws");
    }

    #[test]
    fn test_fenced_json() {
        let value = extract_json("```json\n{\"provider\": \"gcp\"}\n```").unwrap();
        assert_eq!(value["provider"], "gcp");

        let bare = extract_json("```\n[1, 2]\n```").unwrap();
        assert_eq!(bare, serde_json::json!([1, 2]));
    }

    #[test]
    fn test_embedded_object() {
        let value = extract_json("Here is the plan: {\"steps\": [\"build\"]} Good luck!").unwrap();
        assert_eq!(value["steps"][0], "build");
    }

    #[test]
    fn test_empty_and_invalid() {
        assert!(matches!(extract_json("   "), Err(CompletionError::EmptyResponse)));
        assert!(matches!(extract_json("no json here"), Err(CompletionError::Parse(_))));
        assert!(matches!(extract_json("{broken"), Err(CompletionError::Parse(_))));
    }
}
