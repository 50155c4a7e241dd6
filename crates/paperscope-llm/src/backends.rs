//! Concrete oracle backends.
//!
//! Backends:
//!   OllamaOracle           — local Ollama (OpenAI-compatible endpoint)
//!   OpenAiCompatibleOracle — any OpenAI-compatible endpoint (OpenAI itself,
//!                            LMStudio, TogetherAI, Groq, OpenRouter, vLLM, …)
//!   AnthropicOracle        — Anthropic Messages API (claude-*)
//!
//! All three send the prompt as a single user message and return the first
//! text block of the completion.

use async_trait::async_trait;
use paperscope_common::LlmConfig;
use std::sync::Arc;

use crate::oracle::{LlmError, LlmOracle};

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.1;

async fn check_response_status(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status >= 400 {
        let msg = body["error"]["message"]
            .as_str()
            .or_else(|| body["message"].as_str())
            .unwrap_or("unknown API error")
            .to_string();
        return Err(LlmError::ApiError { status, message: msg });
    }
    Ok(body)
}

fn chat_completion_body(model: &str, prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model":       model,
        "messages":    [{"role": "user", "content": prompt}],
        "max_tokens":  DEFAULT_MAX_TOKENS,
        "temperature": DEFAULT_TEMPERATURE,
    })
}

fn extract_chat_content(json: &serde_json::Value) -> String {
    json["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string()
}

/// Build the oracle described by an [`LlmConfig`].
pub fn oracle_from_config(cfg: &LlmConfig) -> Result<Arc<dyn LlmOracle>, LlmError> {
    match cfg.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaOracle::new(&cfg.base_url, &cfg.model))),
        "openai" => Ok(Arc::new(OpenAiCompatibleOracle::new(
            &cfg.base_url,
            &cfg.model,
            cfg.api_key.clone(),
        ))),
        "anthropic" => {
            let key = cfg.api_key.clone().ok_or_else(|| {
                LlmError::Unavailable("anthropic provider requires an api_key".to_string())
            })?;
            Ok(Arc::new(AnthropicOracle::new(key, &cfg.model)))
        }
        other => Err(LlmError::Unavailable(format!("unknown LLM provider '{other}'"))),
    }
}

// ── 1. Ollama (local) ─────────────────────────────────────────────────────────

pub struct OllamaOracle {
    pub base_url: String,
    pub model: String,
    client: reqwest::Client,
}

impl OllamaOracle {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmOracle for OllamaOracle {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = chat_completion_body(&self.model, prompt);
        let resp = self.client.post(&url).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(extract_chat_content(&json))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── 2. OpenAI-compatible (OpenAI, LMStudio, Groq, OpenRouter, vLLM, …) ────────

pub struct OpenAiCompatibleOracle {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleOracle {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(k) => req.bearer_auth(k),
            None => req,
        }
    }
}

#[async_trait]
impl LlmOracle for OpenAiCompatibleOracle {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = chat_completion_body(&self.model, prompt);
        let resp = self.auth(self.client.post(&url)).json(&body).send().await?;
        let json = check_response_status(resp).await?;
        Ok(extract_chat_content(&json))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── 3. Anthropic (claude-*) ───────────────────────────────────────────────────

pub struct AnthropicOracle {
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicOracle {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmOracle for AnthropicOracle {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model":      self.model,
            "messages":   [{"role": "user", "content": prompt}],
            "max_tokens": DEFAULT_MAX_TOKENS,
        });

        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json = check_response_status(resp).await?;

        let content = json["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|b| b["text"].as_str())
            .unwrap_or("")
            .to_string();

        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_from_config_defaults_to_ollama() {
        let cfg = LlmConfig::default();
        let oracle = oracle_from_config(&cfg).unwrap();
        assert_eq!(oracle.model_id(), "llama3:8b");
    }

    #[test]
    fn test_anthropic_requires_api_key() {
        let cfg = LlmConfig {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(oracle_from_config(&cfg), Err(LlmError::Unavailable(_))));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let cfg = LlmConfig { provider: "palm".to_string(), ..Default::default() };
        assert!(oracle_from_config(&cfg).is_err());
    }

    #[test]
    fn test_chat_body_shape() {
        let body = chat_completion_body("m", "score this");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "score this");
    }
}
