//! Recovery of structured JSON from model output.
//!
//! Even with the server's JSON mode enabled, models occasionally wrap their
//! answer in prose or a markdown fence. Strategies are tried in a fixed order
//! and the first one that parses wins:
//!
//! 1. the whole text
//! 2. the span from the first `{` to the last `}`
//! 3. the body of the first ```` ```json ```` fence
//!
//! The order matters on adversarial input: prose with a stray brace before a
//! valid fence makes strategy 2 fail, and strategy 3 then picks the fence.

use serde_json::Value;
use thiserror::Error;

/// Characters of raw output kept in a recovery error.
pub const PREVIEW_CHARS: usize = 500;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    WholeText,
    BraceSpan,
    FencedBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    pub strategy: Strategy,
}

#[derive(Debug, Error)]
#[error("{reason} (preview: {preview:?})")]
pub struct RecoveryError {
    pub reason: String,
    pub preview: String,
}

impl RecoveryError {
    pub fn new(raw: &str) -> Self {
        Self::with_reason(raw, "no JSON could be recovered from model output")
    }

    /// JSON was recovered but does not have the expected shape.
    pub fn with_reason(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            preview: raw.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

pub fn parse_structured(raw: &str) -> Result<Recovered, RecoveryError> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Ok(Recovered {
            value,
            strategy: Strategy::WholeText,
        });
    }

    if let Some(value) = brace_span(raw).and_then(|s| serde_json::from_str(s).ok()) {
        return Ok(Recovered {
            value,
            strategy: Strategy::BraceSpan,
        });
    }

    if let Some(value) = fenced_block(raw).and_then(|s| serde_json::from_str(s).ok()) {
        return Ok(Recovered {
            value,
            strategy: Strategy::FencedBlock,
        });
    }

    Err(RecoveryError::new(raw))
}

fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Body after the first json fence, up to the next fence or end of text.
fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find(JSON_FENCE)? + JSON_FENCE.len();
    let rest = &raw[start..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_json_is_returned_unchanged() {
        let raw = r#"{"scoring": [{"name": "A", "score": 90}, {"name": "B", "score": 12}]}"#;
        let recovered = parse_structured(raw).unwrap();
        assert_eq!(recovered.strategy, Strategy::WholeText);
        assert_eq!(recovered.value, serde_json::from_str::<Value>(raw).unwrap());
    }

    #[test]
    fn test_fenced_output_from_the_model() {
        let raw = "Here is the result:\n```json\n{\"scoring\":[]}\n```";
        let recovered = parse_structured(raw).unwrap();
        // No brace outside the fence, so the brace span already covers it.
        assert_eq!(recovered.strategy, Strategy::BraceSpan);
        assert_eq!(recovered.value, json!({"scoring": []}));
    }

    #[test]
    fn test_stray_brace_in_prose_falls_through_to_fence() {
        let raw = "Voici {le} résultat :\n```json\n{\"scoring\": [{\"name\": \"A\", \"score\": 3}]}\n```\nBonne journée.";
        let recovered = parse_structured(raw).unwrap();
        assert_eq!(recovered.strategy, Strategy::FencedBlock);
        assert_eq!(recovered.value["scoring"][0]["score"], 3);
    }

    #[test]
    fn test_prose_around_object_uses_brace_span() {
        let raw = "Sure! {\"match\": [{\"name\": \"A\", \"skills\": [1, 2]}]} Hope this helps.";
        let recovered = parse_structured(raw).unwrap();
        assert_eq!(recovered.strategy, Strategy::BraceSpan);
        assert_eq!(recovered.value["match"][0]["skills"], json!([1, 2]));
    }

    #[test]
    fn test_unclosed_fence_reads_to_end() {
        let raw = "{ broken\n```json\n{\"scoring\": []}";
        let recovered = parse_structured(raw).unwrap();
        assert_eq!(recovered.strategy, Strategy::FencedBlock);
        assert_eq!(recovered.value, json!({"scoring": []}));
    }

    #[test]
    fn test_garbage_fails_with_bounded_preview() {
        let raw = "x".repeat(2000) + "} no json here {";
        let err = parse_structured(&raw).unwrap_err();
        assert_eq!(err.preview.chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_reversed_braces_do_not_panic() {
        assert!(parse_structured("} nothing {").is_err());
        assert!(parse_structured("").is_err());
    }
}
