//! OpenAI-compatible chat completions client over `reqwest`.

use super::{CompletionClient, CompletionRequest};
use crate::errors::{CfgflowError, CompletionError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiCompatibleConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Bearer credential. Requests fail terminally without one.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Name used in logs and error messages.
    pub provider_name: String,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self::openai(None)
    }
}

impl OpenAiCompatibleConfig {
    /// Settings for the OpenAI endpoint.
    #[must_use]
    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key,
            timeout_secs: 120,
            provider_name: "openai".to_string(),
        }
    }

    /// Settings for the DeepSeek endpoint.
    #[must_use]
    pub fn deepseek(api_key: Option<String>) -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key,
            timeout_secs: 120,
            provider_name: "deepseek".to_string(),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Sends one user message to `POST {base_url}/chat/completions`.
///
/// The client performs a single request per call; retrying belongs to the
/// [`CompletionInvoker`](super::CompletionInvoker).
pub struct OpenAiCompatibleClient {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, CfgflowError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CfgflowError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Returns the endpoint settings.
    #[must_use]
    pub fn config(&self) -> &OpenAiCompatibleConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.config.provider_name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CompletionError::terminal(format!(
                    "No API key configured for {}",
                    self.config.provider_name
                ))
            })?;

        let body = ChatCompletionsRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        debug!(provider = %self.config.provider_name, model = %request.model, "POST chat/completions");

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                CompletionError::transient(format!(
                    "Failed to reach {} at {}: {e}",
                    self.config.provider_name, self.config.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CompletionError::from_status(status.as_u16(), &error_text));
        }

        let parsed: ChatCompletionsResponse = response.json().await.map_err(|e| {
            CompletionError::transient(format!(
                "Failed to parse {} response: {e}",
                self.config.provider_name
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CompletionError::transient("No choices in completion response"))
    }
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("base_url", &self.config.base_url)
            .field("provider_name", &self.config.provider_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_api_key_is_terminal() {
        let client = OpenAiCompatibleClient::new(OpenAiCompatibleConfig::deepseek(None)).unwrap();
        let request = CompletionRequest::new("deepseek-chat", "hello", 0.0);

        let err = client.complete(&request).await.unwrap_err();

        assert!(!err.is_transient());
        assert!(err.to_string().contains("deepseek"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = OpenAiCompatibleConfig::openai(Some("sk-test".to_string()))
            .with_base_url("http://127.0.0.1:9")
            .with_timeout_secs(2);
        let client = OpenAiCompatibleClient::new(config).unwrap();
        let request = CompletionRequest::new("gpt-4", "hello", 0.0);

        let err = client.complete(&request).await.unwrap_err();

        assert!(err.is_transient());
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = OpenAiCompatibleConfig::openai(None).with_base_url("http://localhost:1234/v1/");
        let client = OpenAiCompatibleClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: ChatCompletionsResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"dot.node('A')"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("dot.node('A')"));
    }
}
