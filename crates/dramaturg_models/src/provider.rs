//! Provider selection and driver construction.

use crate::{AnthropicClient, OpenAICompatibleClient};
use dramaturg_error::{ProviderError, ProviderErrorKind};
use dramaturg_interface::DramaturgDriver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Default DeepSeek endpoint.
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
/// Default OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Supported LLM providers.
///
/// # Examples
///
/// ```
/// use dramaturg_models::Provider;
/// use std::str::FromStr;
///
/// let provider = Provider::from_str("deepseek").unwrap();
/// assert_eq!(provider.default_model(), "deepseek-chat");
/// assert_eq!(provider.api_key_var(), "DEEPSEEK_API_KEY");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    /// DeepSeek (OpenAI-compatible)
    #[default]
    DeepSeek,
    /// Anthropic Claude
    Anthropic,
    /// OpenAI
    OpenAi,
}

impl Provider {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "deepseek-chat",
            Provider::Anthropic => "claude-sonnet-4-5",
            Provider::OpenAi => "gpt-4-turbo-preview",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::DeepSeek => "DEEPSEEK_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

/// Builds a driver, reading the API key (and DeepSeek base URL) from the environment.
///
/// # Errors
///
/// Returns an error if the key is unset or the client cannot be built.
#[instrument(skip_all, fields(provider = %provider))]
pub fn create_driver(
    provider: Provider,
    model: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn DramaturgDriver>, ProviderError> {
    let var = provider.api_key_var();
    let api_key = std::env::var(var)
        .map_err(|_| ProviderError::new(ProviderErrorKind::MissingApiKey(var.to_string())))?;
    let base_url = match provider {
        Provider::DeepSeek => {
            std::env::var("DEEPSEEK_BASE_URL").unwrap_or_else(|_| DEEPSEEK_BASE_URL.to_string())
        }
        Provider::OpenAi => OPENAI_BASE_URL.to_string(),
        Provider::Anthropic => String::new(),
    };
    create_driver_with_key(provider, model, api_key, &base_url, timeout)
}

/// Builds a driver with an explicit key. `base_url` is ignored for Anthropic.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub fn create_driver_with_key(
    provider: Provider,
    model: Option<&str>,
    api_key: String,
    base_url: &str,
    timeout: Duration,
) -> Result<Arc<dyn DramaturgDriver>, ProviderError> {
    let model = model.unwrap_or_else(|| provider.default_model());
    info!(provider = %provider, model, "Creating LLM driver");
    let driver: Arc<dyn DramaturgDriver> = match provider {
        Provider::DeepSeek => Arc::new(OpenAICompatibleClient::new(
            api_key, model, base_url, "deepseek", timeout,
        )?),
        Provider::OpenAi => Arc::new(OpenAICompatibleClient::new(
            api_key, model, base_url, "openai", timeout,
        )?),
        Provider::Anthropic => Arc::new(AnthropicClient::new(api_key, model, timeout)?),
    };
    Ok(driver)
}
