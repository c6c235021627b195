//! Client for OpenAI-compatible chat completion APIs (OpenAI, DeepSeek).

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

/// A chat message in the OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    role: String,
    /// Message text
    content: String,
}

/// Chat completion request body.
#[derive(Debug, Clone, PartialEq, Serialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct ChatRequest {
    /// Model identifier
    model: String,
    /// Conversation
    messages: Vec<ChatMessage>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Completion token cap
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Creates a new request builder.
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }
}

/// One completion choice.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    /// The generated message
    pub message: ChatChoiceMessage,
}

/// Message inside a choice; content may be null for refusals.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoiceMessage {
    /// Generated text
    #[serde(default)]
    pub content: Option<String>,
}

/// Token accounting block.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ChatUsage {
    /// Prompt tokens
    pub prompt_tokens: u64,
    /// Completion tokens
    pub completion_tokens: u64,
    /// Total tokens
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Chat completion response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; only the first is used
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Token accounting
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Converts the first choice into a provider-neutral response.
    pub fn into_generate_response(self) -> Result<GenerateResponse, ProviderError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ProviderError::new(ProviderErrorKind::InvalidResponse(
                    "response has no message content".to_string(),
                ))
            })?;
        let usage = self.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens.unwrap_or(u.prompt_tokens + u.completion_tokens),
        });
        Ok(GenerateResponse { text, usage })
    }
}

/// Client for any `/chat/completions` endpoint that speaks the OpenAI protocol.
#[derive(Debug, Clone)]
pub struct OpenAICompatibleClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    provider: &'static str,
}

impl OpenAICompatibleClient {
    /// Creates a client for `{base_url}/chat/completions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    #[instrument(skip_all, fields(provider = provider, base_url = base_url))]
    pub fn new(
        api_key: impl Into<String>,
        model: impl AsRef<str>,
        base_url: &str,
        provider: &'static str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        debug!(endpoint = %endpoint, "Creating OpenAI-compatible client");
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.into(),
            model: model.as_ref().to_string(),
            endpoint,
            provider,
        })
    }

    /// Full completion URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Converts a provider-neutral request into the wire format.
    pub fn convert_request(&self, request: &GenerateRequest) -> Result<ChatRequest, ProviderError> {
        let messages = request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect::<Vec<_>>();

        ChatRequest::builder()
            .model(request.model.clone().unwrap_or_else(|| self.model.clone()))
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| ProviderError::new(ProviderErrorKind::ClientCreation(e.to_string())))
    }

    async fn complete(&self, request: &GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let body = self.convert_request(request)?;
        let pending = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);
        let response: ChatResponse = send_json(self.provider, pending).await?;
        response.into_generate_response()
    }
}

#[async_trait]
impl DramaturgDriver for OpenAICompatibleClient {
    #[instrument(skip(self, req), fields(provider = self.provider, model = %self.model, messages = req.messages.len()))]
    async fn generate(&self, req: &GenerateRequest) -> DramaturgResult<GenerateResponse> {
        let metrics = LlmMetrics::get();
        let start = Instant::now();
        match self.complete(req).await {
            Ok(response) => {
                metrics.record_success(self.provider, &self.model, start.elapsed(), response.usage);
                debug!(chars = response.text.len(), "Received completion");
                Ok(response)
            }
            Err(e) => {
                metrics.record_failure(self.provider, &self.model, &e.kind);
                Err(e.into())
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dramaturg_core::Message;

    fn client() -> OpenAICompatibleClient {
        OpenAICompatibleClient::new(
            "sk-test",
            "deepseek-chat",
            "https://api.deepseek.com/v1/",
            "deepseek",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(client().endpoint(), "https://api.deepseek.com/v1/chat/completions");
    }

    #[test]
    fn request_keeps_roles_and_settings() {
        let request = GenerateRequest {
            messages: vec![Message::system("rules"), Message::user("payload")],
            max_tokens: Some(512),
            temperature: Some(0.0),
            model: None,
        };
        let body = client().convert_request(&request).unwrap();
        assert_eq!(body.model(), "deepseek-chat");
        assert_eq!(body.messages()[0].role(), "system");
        assert_eq!(*body.max_tokens(), Some(512));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][1]["content"], "payload");
    }

    #[test]
    fn response_reads_first_choice_and_usage() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "{\"ok\": true}"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}}"#,
        )
        .unwrap();
        let response = response.into_generate_response().unwrap();
        assert_eq!(response.text, "{\"ok\": true}");
        assert_eq!(response.usage, Some(TokenUsage::new(10, 5)));
    }

    #[test]
    fn empty_choices_are_invalid() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = response.into_generate_response().unwrap_err();
        assert!(matches!(err.kind, ProviderErrorKind::InvalidResponse(_)));
    }
}
