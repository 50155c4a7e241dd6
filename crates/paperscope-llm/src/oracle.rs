//! The oracle trait consumed by the relevance matcher.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    #[error("API error [{status}]: {message}")]
    ApiError { status: u16, message: String },
}

/// Narrow completion interface: one prompt in, raw completion text out.
///
/// The oracle is expected (not guaranteed) to return JSON when the prompt
/// asks for it; parsing and fallback live with the caller.
#[async_trait]
pub trait LlmOracle: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_id(&self) -> &str;
}

/// Scripted oracle for tests: returns canned responses in order, repeating
/// the last one once exhausted.
pub struct MockOracle {
    responses: Mutex<Vec<String>>,
    model: String,
}

impl MockOracle {
    pub fn new(responses: Vec<String>) -> Self {
        Self { responses: Mutex::new(responses), model: "mock".to_string() }
    }

    /// Oracle that always returns the same response.
    pub fn always(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }
}

#[async_trait]
impl LlmOracle for MockOracle {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Unavailable("mock oracle has no responses".to_string()));
        }
        if responses.len() == 1 {
            Ok(responses[0].clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_oracle_drains_in_order() {
        let oracle = MockOracle::new(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(oracle.generate("p").await.unwrap(), "first");
        assert_eq!(oracle.generate("p").await.unwrap(), "second");
        // Last response repeats
        assert_eq!(oracle.generate("p").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_empty_mock_is_unavailable() {
        let oracle = MockOracle::new(vec![]);
        assert!(matches!(
            oracle.generate("p").await,
            Err(LlmError::Unavailable(_))
        ));
    }
}
