//! Chat completion providers.
//!
//! [`ChatProvider`] is the seam between the assistant logic and the network.
//! [`AnthropicClient`] talks to the Messages API; [`UnconfiguredProvider`]
//! stands in when no API key is set so that every call still fails (and is
//! still logged) in the normal way.

use crate::{
    config::{AiSettings, secrets},
    errors::{Error, Result},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Anthropic API root used when `ANTHROPIC_BASE_URL` is not set.
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
/// Messages API path, also recorded as `endpoint_used` in the usage log.
pub const MESSAGES_ENDPOINT: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user
    User,
    /// Model
    Assistant,
}

/// One turn of a conversation with the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Speaker
    pub role: Role,
    /// Text
    pub content: String,
}

impl PromptMessage {
    /// A user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Provider-level request, after task presets are applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model name
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Conversation, oldest first
    pub messages: Vec<PromptMessage>,
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens
    pub input_tokens: i64,
    /// Completion tokens
    pub output_tokens: i64,
}

/// Provider-level response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Model that answered
    pub model: String,
    /// Token usage, if reported
    pub usage: Option<Usage>,
}

/// A chat completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Whether the provider has credentials.
    fn is_configured(&self) -> bool;

    /// Runs one completion.
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Provider used when `ANTHROPIC_API_KEY` is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredProvider;

#[async_trait]
impl ChatProvider for UnconfiguredProvider {
    fn is_configured(&self) -> bool {
        false
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Err(Error::AiNotConfigured {
            variable: secrets::ANTHROPIC_API_KEY,
        })
    }
}

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicClient {
    /// Creates a client with the given key and request timeout.
    ///
    /// # Errors
    /// Returns an error if the key is blank or the HTTP client cannot be built.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::AiNotConfigured {
                variable: secrets::ANTHROPIC_API_KEY,
            });
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_ANTHROPIC_URL.to_string(),
        })
    }

    /// Builds a client from `ANTHROPIC_API_KEY` and optional `ANTHROPIC_BASE_URL`.
    ///
    /// # Errors
    /// Returns [`Error::AiNotConfigured`] when the key is not set.
    pub fn from_env(settings: &AiSettings) -> Result<Self> {
        let api_key = secrets::get_secret(secrets::ANTHROPIC_API_KEY).ok_or(Error::AiNotConfigured {
            variable: secrets::ANTHROPIC_API_KEY,
        })?;
        let client = Self::new(api_key, Duration::from_secs(settings.timeout_secs))?;
        Ok(match secrets::get_secret(secrets::ANTHROPIC_BASE_URL) {
            Some(url) => client.with_base_url(url),
            None => client,
        })
    }

    /// Points the client at another API root (proxies, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatProvider for AnthropicClient {
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let url = format!("{}{MESSAGES_ENDPOINT}", self.base_url);
        debug!(
            "Sending {} messages to {} ({})",
            request.messages.len(),
            url,
            request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!("Anthropic API returned {status}: {message}");
            return Err(Error::Ai {
                message: format!("{status}: {message}"),
            });
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(CompletionResponse {
            text,
            model: parsed.model,
            usage: parsed.usage,
        })
    }
}
