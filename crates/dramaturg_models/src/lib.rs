//! LLM provider integrations for dramaturg.
//!
//! # Available Providers
//!
//! - **DeepSeek** via the OpenAI-compatible client (default)
//! - **OpenAI** via the OpenAI-compatible client
//! - **Anthropic** via the Messages API client
//!
//! ```no_run
//! use dramaturg_core::{GenerateRequest, Message};
//! use dramaturg_models::{Provider, create_driver};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = create_driver(Provider::DeepSeek, None, Duration::from_secs(120))?;
//! let request = GenerateRequest {
//!     messages: vec![Message::user("Reply with {\"ok\": true}")],
//!     ..Default::default()
//! };
//! let response = driver.generate(&request).await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod anthropic;
mod http;
mod metrics;
mod openai_compat;
mod provider;

pub use anthropic::{
    AnthropicClient, AnthropicContentBlock, AnthropicMessage, AnthropicRequest,
    AnthropicRequestBuilder, AnthropicResponse, AnthropicUsage,
};
pub use metrics::{LlmMetrics, classify_error};
pub use openai_compat::{
    ChatChoice, ChatChoiceMessage, ChatMessage, ChatRequest, ChatRequestBuilder, ChatResponse,
    ChatUsage, OpenAICompatibleClient,
};
pub use provider::{
    DEEPSEEK_BASE_URL, OPENAI_BASE_URL, Provider, create_driver, create_driver_with_key,
};
