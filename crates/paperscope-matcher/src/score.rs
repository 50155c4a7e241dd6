//! Parsing of oracle score responses.
//!
//! The oracle is asked for JSON only, but real responses arrive bare, inside
//! a fenced code block, or malformed. This module is the only place that
//! wrangles that text; everything downstream sees a typed result. Scores
//! outside [0,1] are clamped, never rejected.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoreParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A successfully parsed score response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    /// Clamped into [0,1].
    pub score: f64,
    pub matched_keywords: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Deserialize)]
struct RawScore {
    score: f64,
    #[serde(default)]
    matched_keywords: Vec<String>,
    #[serde(default)]
    reasoning: String,
}

/// Parse a raw oracle response into a [`ParsedScore`].
pub fn parse_score_response(raw: &str) -> Result<ParsedScore, ScoreParseError> {
    let body = strip_code_fence(raw);
    let parsed: RawScore = serde_json::from_str(body)?;
    Ok(ParsedScore {
        score: parsed.score.clamp(0.0, 1.0),
        matched_keywords: parsed.matched_keywords,
        reasoning: parsed.reasoning,
    })
}

/// If the response is wrapped in a markdown code fence (with or without a
/// language tag), return the fenced body; otherwise return the input trimmed.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bare_json() {
        let parsed = parse_score_response(
            r#"{"score": 0.85, "matched_keywords": ["transformer"], "reasoning": "on topic"}"#,
        )
        .unwrap();
        assert_eq!(parsed.score, 0.85);
        assert_eq!(parsed.matched_keywords, vec!["transformer"]);
        assert_eq!(parsed.reasoning, "on topic");
    }

    #[test]
    fn test_parses_fenced_json() {
        let raw = "```json\n{\"score\": 0.7, \"matched_keywords\": [], \"reasoning\": \"ok\"}\n```";
        let parsed = parse_score_response(raw).unwrap();
        assert_eq!(parsed.score, 0.7);
    }

    #[test]
    fn test_parses_fence_without_language_tag() {
        let raw = "```\n{\"score\": 0.5}\n```";
        let parsed = parse_score_response(raw).unwrap();
        assert_eq!(parsed.score, 0.5);
        assert!(parsed.matched_keywords.is_empty());
        assert!(parsed.reasoning.is_empty());
    }

    #[test]
    fn test_malformed_response_is_an_error() {
        assert!(parse_score_response("I think this paper scores about 0.8").is_err());
        assert!(parse_score_response("").is_err());
        assert!(parse_score_response("```json\nnot json\n```").is_err());
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let high = parse_score_response(r#"{"score": 1.7}"#).unwrap();
        assert_eq!(high.score, 1.0);
        let low = parse_score_response(r#"{"score": -0.3}"#).unwrap();
        assert_eq!(low.score, 0.0);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let parsed = parse_score_response(r#"{"score": 0.4}"#).unwrap();
        assert!(parsed.matched_keywords.is_empty());
        assert!(parsed.reasoning.is_empty());
    }
}
