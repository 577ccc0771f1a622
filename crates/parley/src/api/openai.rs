//! Async HTTP client for OpenAI-compatible chat-completions endpoints.
//!
//! One request per turn: the full message list goes out, one assistant reply
//! comes back. The base URL is configuration, so the same client speaks to
//! OpenAI, OpenRouter, or any self-hosted compatible gateway — provider
//! identity is not a protocol concern here.

use crate::error::ProviderError;
use crate::{Message, MessageRole};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::retry::RetryConfig;
use super::{CompletionBackend, CompletionFuture};

// ── Wire types ─────────────────────────────────────────────────────

/// Chat completion request body. Only the fields this runtime uses; the
/// endpoint ignores absent optionals.
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage<'a>],
    max_tokens: u32,
    temperature: f32,
}

/// Borrowed view of a [`Message`] in the provider's wire shape.
#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorBody>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorBody {
    message: String,
}

/// Token usage statistics, logged when the provider reports them.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Live [`CompletionBackend`] over an OpenAI-compatible HTTP endpoint.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryConfig,
}

impl OpenAiCompatClient {
    /// Create a client with the given credentials and endpoint.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("parley/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature,
            max_tokens,
            retry,
        })
    }

    /// Build a client from an [`AgentConfig`](crate::config::AgentConfig)
    /// that carries an API key.
    pub fn from_config(
        config: &crate::config::AgentConfig,
        api_key: &str,
    ) -> Result<Self, ProviderError> {
        Self::new(
            api_key,
            config.base_url.as_str(),
            config.model.as_str(),
            config.temperature,
            config.max_tokens,
            Duration::from_secs(config.request_timeout_secs),
            RetryConfig::with_retries(config.max_retries),
        )
    }

    /// Single request/response exchange, no retry.
    async fn chat_once(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let wire: Vec<WireMessage<'_>> = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: &m.content,
            })
            .collect();
        let body = ChatRequest {
            model: &self.model,
            messages: &wire,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            "completion request: model={}, messages={}, max_tokens={}, temp={}",
            self.model,
            messages.len(),
            self.max_tokens,
            self.temperature,
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "completion response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Malformed(format!("failed to parse response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ProviderError::Malformed(err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ProviderError::Empty)
    }
}

impl CompletionBackend for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai-compat"
    }

    fn is_live(&self) -> bool {
        true
    }

    fn complete<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a> {
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                match self.chat_once(messages).await {
                    Ok(reply) => return Ok(reply),
                    Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!(
                            "transient provider failure (attempt {}/{}): {e}; retrying in {:.1}s",
                            attempt + 1,
                            self.retry.max_retries + 1,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(retries: u32) -> OpenAiCompatClient {
        OpenAiCompatClient::new(
            "sk-test",
            "http://localhost:1/v1/chat/completions",
            "test-model",
            0.0,
            16,
            Duration::from_millis(200),
            RetryConfig::with_retries(retries),
        )
        .unwrap()
    }

    #[test]
    fn request_body_wire_shape() {
        let messages = [Message::system("rules"), Message::user("hi")];
        let wire: Vec<WireMessage<'_>> = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: &m.content,
            })
            .collect();
        let body = ChatRequest {
            model: "test-model",
            messages: &wire,
            max_tokens: 64,
            temperature: 0.5,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 64);
    }

    #[test]
    fn response_parsing_extracts_first_choice() {
        let raw = r#"{
            "choices": [{"message": {"content": "Hello back"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let parsed: RawChatResponse = serde_json::from_str(raw).unwrap();
        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content)
            .unwrap();
        assert_eq!(content, "Hello back");
    }

    #[test]
    fn response_parsing_tolerates_missing_usage() {
        let raw = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let parsed: RawChatResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.usage.is_none());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn embedded_error_body_parses() {
        let raw = r#"{"error": {"message": "model overloaded"}}"#;
        let parsed: RawChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.unwrap().message, "model overloaded");
        assert!(parsed.choices.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_transport_error() {
        let client = test_client(0);
        let err = client
            .complete(&[Message::user("hi")])
            .await
            .expect_err("nothing listens on port 1");
        assert!(matches!(
            err,
            ProviderError::Transport(_) | ProviderError::Timeout
        ));
    }

    #[test]
    fn backend_identifies_as_live() {
        let client = test_client(0);
        assert!(client.is_live());
        assert_eq!(client.name(), "openai-compat");
    }
}
