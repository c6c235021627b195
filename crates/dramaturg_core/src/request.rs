//! Request and response types for LLM generation.

use crate::Message;
use serde::{Deserialize, Serialize};

/// Provider-neutral generation request.
///
/// # Examples
///
/// ```
/// use dramaturg_core::{GenerateRequest, Message};
///
/// let request = GenerateRequest {
///     messages: vec![Message::system("Find the conflict chains."), Message::user("{}")],
///     max_tokens: Some(4096),
///     temperature: Some(0.0),
///     model: None,
/// };
///
/// assert_eq!(request.messages.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    /// The conversation messages to send
    pub messages: Vec<Message>,
    /// Maximum number of tokens to generate
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Model identifier override
    pub model: Option<String>,
}

/// Token counts reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u64,
    /// Completion tokens
    pub completion_tokens: u64,
    /// Prompt plus completion
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Usage with the total derived from its parts.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Raw text returned by a provider.
///
/// # Examples
///
/// ```
/// use dramaturg_core::{GenerateResponse, TokenUsage};
///
/// let response = GenerateResponse {
///     text: "{\"tccs\": []}".to_string(),
///     usage: Some(TokenUsage::new(1200, 300)),
/// };
/// assert_eq!(response.usage.map(|u| u.total_tokens), Some(1500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Completion text
    pub text: String,
    /// Token accounting, when the provider reports it
    pub usage: Option<TokenUsage>,
}
