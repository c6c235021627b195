//! Anthropic Messages API client.

use crate::http::{build_client, send_json};
use crate::metrics::LlmMetrics;
use async_trait::async_trait;
use derive_getters::Getters;
use dramaturg_core::{GenerateRequest, GenerateResponse, Role, TokenUsage};
use dramaturg_error::{DramaturgResult, ProviderError, ProviderErrorKind};
use dramaturg_interface::DramaturgDriver;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// A conversation turn in the Anthropic wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct AnthropicMessage {
    /// `user` or `assistant`
    role: String,
    /// Turn text
    content: String,
}

/// Messages API request body. System prompts travel in `system`, not in `messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct AnthropicRequest {
    /// Model identifier
    model: String,
    /// Completion token cap (required by the API)
    max_tokens: u32,
    /// Conversation turns
    messages: Vec<AnthropicMessage>,
    /// Concatenated system prompts
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl AnthropicRequest {
    /// Creates a new request builder.
    pub fn builder() -> AnthropicRequestBuilder {
        AnthropicRequestBuilder::default()
    }
}

/// A content block in a response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicContentBlock {
    /// Generated text
    Text {
        /// The text
        text: String,
    },
    /// Any block type this client does not use
    #[serde(other)]
    Other,
}

/// Token accounting block.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AnthropicUsage {
    /// Prompt tokens
    pub input_tokens: u64,
    /// Completion tokens
    pub output_tokens: u64,
}

/// Messages API response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnthropicResponse {
    /// Response id
    #[serde(default)]
    pub id: String,
    /// Content blocks
    #[serde(default)]
    pub content: Vec<AnthropicContentBlock>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<AnthropicUsage>,
}

impl AnthropicResponse {
    /// Joins the text blocks into a provider-neutral response.
    pub fn into_generate_response(self) -> Result<GenerateResponse, ProviderError> {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(ProviderError::new(ProviderErrorKind::InvalidResponse(
                "response has no text content".to_string(),
            )));
        }
        let usage = self
            .usage
            .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens));
        Ok(GenerateResponse { text, usage })
    }
}

/// Anthropic API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    /// Creates a new Anthropic client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    #[instrument(skip_all)]
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        debug!("Creating new Anthropic client");
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    /// Converts a provider-neutral request into the Messages API format.
    pub fn convert_request(&self, request: &GenerateRequest) -> Result<AnthropicRequest, ProviderError> {
        let system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>();
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnthropicMessage {
                role: if m.role == Role::Assistant { "assistant" } else { "user" }.to_string(),
                content: m.content.clone(),
            })
            .collect::<Vec<_>>();

        AnthropicRequest::builder()
            .model(request.model.clone().unwrap_or_else(|| self.model.clone()))
            .max_tokens(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS))
            .messages(messages)
            .system((!system.is_empty()).then(|| system.join("\n\n")))
            .temperature(request.temperature)
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::ClientCreation(e.to_string())))
    }

    async fn complete(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let body = self.convert_request(request)?;
        let pending = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response: AnthropicResponse = send_json("anthropic", pending).await?;
        debug!(response_id = %response.id, "Received response from Anthropic");
        response.into_generate_response()
    }
}

#[async_trait]
impl DramaturgDriver for AnthropicClient {
    #[instrument(skip(self, req), fields(provider = "anthropic", model = %self.model))]
    async fn generate(&self, req: &GenerateRequest) -> DramaturgResult<GenerateResponse> {
        let metrics = LlmMetrics::get();
        let start = Instant::now();
        match self.complete(req).await {
            Ok(response) => {
                metrics.record_success("anthropic", &self.model, start.elapsed(), response.usage);
                Ok(response)
            }
            Err(e) => {
                metrics.record_failure("anthropic", &self.model, &e.kind);
                Err(e.into())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramaturg_core::Message;

    #[test]
    fn system_prompt_moves_to_top_level() {
        let client = AnthropicClient::new("key", "claude-sonnet-4-5", Duration::from_secs(5)).unwrap();
        let request = GenerateRequest {
            messages: vec![Message::system("rank the chains"), Message::user("{}")],
            ..Default::default()
        };
        let body = client.convert_request(&request).unwrap();
        assert_eq!(body.system().as_deref(), Some("rank the chains"));
        assert_eq!(body.messages().len(), 1);
        assert_eq!(*body.max_tokens(), DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn response_joins_text_blocks() {
        let response: AnthropicResponse = serde_json::from_str(
            r#"{"id": "msg_1", "content": [{"type": "text", "text": "{\"a\":"}, {"type": "text", "text": " 1}"}],
                "usage": {"input_tokens": 7, "output_tokens": 3}}"#,
        )
        .unwrap();
        let response = response.into_generate_response().unwrap();
        assert_eq!(response.text, "{\"a\": 1}");
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(10));
    }
}
