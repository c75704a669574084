//! AI chat provider abstraction
//!
//! Provides a unified interface for the external generation provider:
//! - OpenAI-compatible chat completion endpoints
//! - Mock provider for tests and local development
//!
//! One synchronous call per generation; the provider's HTTP timeout is
//! the only timeout in the path and nothing is retried.

mod tools;

pub use tools::{render_template, validate_params, GenerationOutput, ParamKind, ParamSpec, ToolRunner};

use crate::config::AiConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A fully rendered generation request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for chat completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a completion for the request
    async fn complete(&self, request: &ChatRequest) -> Result<String>;

    /// Get the provider name (for logging and metrics)
    fn name(&self) -> &str;
}

/// OpenAI-compatible chat completion client
pub struct OpenAiChatProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

impl OpenAiChatProvider {
    /// Create a new OpenAI chat provider
    pub fn new(api_key: String, base_url: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: &request.model,
            messages: vec![
                OpenAiMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                OpenAiMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Provider {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: OpenAiResponse = response.json().await.map_err(|e| AppError::Provider {
            message: format!("Failed to parse response: {}", e),
        })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Provider {
                message: "Empty response".to_string(),
            })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Mock provider for testing
pub struct MockChatProvider {
    reply: String,
    fail_with: Option<String>,
}

impl MockChatProvider {
    /// A provider that always replies with the given text
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail_with: None,
        }
    }

    /// A provider that always fails with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: String::new(),
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        match &self.fail_with {
            Some(message) => Err(AppError::Provider {
                message: message.clone(),
            }),
            None => Ok(self.reply.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Create a chat provider based on configuration
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "openai" => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| AppError::Configuration {
                    message: "OpenAI provider requires ai.api_key".to_string(),
                })?;
            Ok(Arc::new(OpenAiChatProvider::new(
                api_key,
                config.api_base.clone(),
                config.timeout_secs,
            )))
        }
        "mock" => Ok(Arc::new(MockChatProvider::replying("mock reply"))),
        other => {
            tracing::warn!(provider = other, "Unknown chat provider");
            Err(AppError::Configuration {
                message: format!("Unknown chat provider: {}", other),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a teaching assistant.".to_string(),
            user_prompt: "Say X".to_string(),
            max_tokens: 16,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_mock_provider_reply() {
        let provider = MockChatProvider::replying("X");
        let reply = provider.complete(&request()).await.unwrap();
        assert_eq!(reply, "X");
    }

    #[tokio::test]
    async fn test_mock_provider_failure() {
        let provider = MockChatProvider::failing("upstream down");
        let err = provider.complete(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::Provider { .. }));
    }

    #[test]
    fn test_create_provider_requires_key() {
        let config = AiConfig {
            provider: "openai".to_string(),
            api_key: None,
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_tokens: 512,
        };
        assert!(create_provider(&config).is_err());
    }
}
