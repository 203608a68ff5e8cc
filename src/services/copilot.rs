use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub const SYSTEM_PROMPT: &str = "You are a scientific writing assistant for the Aris \
platform. Help authors improve clarity, structure, and precision. When manuscript \
context is provided, ground your suggestions in it.";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("chat provider unavailable: {0}")]
    Unavailable(String),
    #[error("chat provider rate limited")]
    RateLimited,
    #[error("chat provider request failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ChatProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError>;
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited
    } else if status.is_server_error() {
        ProviderError::Unavailable(format!("upstream returned {status}"))
    } else {
        ProviderError::Failed(format!("upstream returned {status}: {body}"))
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(err.to_string())
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": message },
            ],
        });

        let response = self
            .client
            .post(OPENAI_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Failed(err.to_string()))?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Failed("response missing message content".to_string()))
    }
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [
                { "role": "user", "content": message },
            ],
        });

        let response = self
            .client
            .post(ANTHROPIC_ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::Failed(err.to_string()))?;
        parsed["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Failed("response missing text content".to_string()))
    }
}

/// Canned provider for development and tests. Echoes enough of the request
/// to make assertions about prompt assembly.
pub struct MockProvider;

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, system: &str, message: &str) -> Result<String, ProviderError> {
        debug!(system_len = system.len(), "mock provider called");
        Ok(format!("[mock] I read your message: {message}"))
    }
}

pub fn provider_from_config(config: &AppConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.copilot_provider.as_str() {
        "openai" => {
            let Some(api_key) = config.openai_api_key.clone() else {
                bail!("OPENAI_API_KEY must be set when COPILOT_PROVIDER=openai");
            };
            Ok(Arc::new(OpenAiProvider::new(api_key, config.openai_model.clone())))
        }
        "anthropic" => {
            let Some(api_key) = config.anthropic_api_key.clone() else {
                bail!("ANTHROPIC_API_KEY must be set when COPILOT_PROVIDER=anthropic");
            };
            Ok(Arc::new(AnthropicProvider::new(
                api_key,
                config.anthropic_model.clone(),
            )))
        }
        "mock" => Ok(Arc::new(MockProvider)),
        other => bail!("unknown copilot provider '{other}'"),
    }
}

/// Folds optional manuscript context into the base system prompt.
pub fn system_prompt_with_context(context: Option<&str>) -> String {
    match context {
        Some(context) if !context.trim().is_empty() => {
            format!("{SYSTEM_PROMPT}\n\nManuscript context:\n{context}")
        }
        _ => SYSTEM_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_echoes_message() {
        let reply = MockProvider
            .complete(SYSTEM_PROMPT, "tighten my abstract")
            .await
            .unwrap();
        assert!(reply.contains("tighten my abstract"));
    }

    #[test]
    fn system_prompt_embeds_context() {
        let prompt = system_prompt_with_context(Some(":rsm:body::"));
        assert!(prompt.contains("Manuscript context:"));
        assert!(prompt.contains(":rsm:body::"));

        let bare = system_prompt_with_context(None);
        assert_eq!(bare, SYSTEM_PROMPT);
        assert_eq!(system_prompt_with_context(Some("   ")), SYSTEM_PROMPT);
    }

    #[test]
    fn status_classification_matches_error_taxonomy() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            ProviderError::Failed(_)
        ));
    }
}
