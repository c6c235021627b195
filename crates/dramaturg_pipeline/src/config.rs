//! Layered pipeline configuration.
//!
//! Sources, later overriding earlier:
//! 1. Bundled defaults (`dramaturg.toml` compiled in)
//! 2. `~/.config/dramaturg/dramaturg.toml`
//! 3. `./dramaturg.toml`

use crate::{FilePromptLibrary, InMemoryPromptLibrary, RetryPolicy, StageSettings};
use config::{Config, File, FileFormat};
use derive_getters::Getters;
use dramaturg_core::Thresholds;
use dramaturg_error::{ConfigError, DramaturgError, DramaturgResult};
use dramaturg_interface::PromptLibrary;
use dramaturg_models::Provider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Provider and request settings.
///
/// ```toml
/// [llm]
/// provider = "deepseek"
/// temperature = 0.0
/// max_tokens = 4096
/// request_timeout_secs = 120
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct LlmConfig {
    /// Provider to call
    #[serde(default)]
    provider: Provider,

    /// Model override; the provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    temperature: f32,

    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,

    /// Deadline for one model call
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Overrides the provider and model, keeping the request settings.
    pub fn with_provider(mut self, provider: Provider, model: Option<String>) -> Self {
        self.provider = provider;
        self.model = model;
        self
    }

    /// Overrides the sampling settings.
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// Retry budget and backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct RetryConfig {
    /// Attempts per stage, including the first
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,

    /// Wait before the second attempt; doubles after that
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,

    /// Upper bound on a single wait
    #[serde(default = "default_max_backoff_ms")]
    max_backoff_ms: u64,

    /// Randomise waits
    #[serde(default)]
    jitter: bool,
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// The policy these settings describe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_attempts,
            self.initial_backoff_ms,
            self.max_backoff_ms,
            self.jitter,
        )
    }
}

/// Where stage prompts come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters)]
pub struct PromptsConfig {
    /// Directory of `stage1_discoverer.md` etc.; built-in prompts when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dir: Option<PathBuf>,
}

/// Cross-run history location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct HistoryConfig {
    /// JSON-lines file of run records
    #[serde(default = "default_history_path")]
    path: PathBuf,
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".dramaturg/history.jsonl")
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

/// Top-level dramaturg configuration.
///
/// # Example
///
/// ```no_run
/// use dramaturg_pipeline::DramaturgConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DramaturgConfig::load()?;
/// println!("provider: {}", config.llm.provider());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DramaturgConfig {
    /// Provider and request settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Retry budget
    #[serde(default)]
    pub retry: RetryConfig,
    /// Heuristic thresholds
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Prompt source
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// Run history
    #[serde(default)]
    pub history: HistoryConfig,
}

impl DramaturgConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> DramaturgResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                DramaturgError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                DramaturgError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged
    /// values are invalid.
    #[instrument]
    pub fn load() -> DramaturgResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../dramaturg.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/dramaturg/dramaturg.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("dramaturg").required(false));

        let config: Self = builder
            .build()
            .map_err(|e| {
                DramaturgError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                DramaturgError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::new("retry.max_attempts must be at least 1"));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::new(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms",
            ));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(ConfigError::new("llm.request_timeout_secs must be positive"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::new(format!(
                "llm.temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }
        self.thresholds.validate()
    }

    /// Stage settings derived from this configuration.
    pub fn stage_settings(&self) -> StageSettings {
        StageSettings::default()
            .with_retry(self.retry.policy())
            .with_request_timeout(Duration::from_secs(self.llm.request_timeout_secs))
            .with_temperature(Some(self.llm.temperature))
            .with_max_tokens(Some(self.llm.max_tokens))
            .with_model(self.llm.model.clone())
            .with_thresholds(self.thresholds.clone())
    }

    /// The configured prompt source.
    ///
    /// # Errors
    ///
    /// Returns an error if a prompt directory is set but incomplete.
    pub fn prompt_library(&self) -> Result<Arc<dyn PromptLibrary>, ConfigError> {
        Ok(match &self.prompts.dir {
            Some(dir) => Arc::new(FilePromptLibrary::load(dir)?),
            None => Arc::new(InMemoryPromptLibrary::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DramaturgConfig::default();
        assert_eq!(*config.retry.max_attempts(), 3);
        assert_eq!(*config.llm.max_tokens(), 4096);
        assert_eq!(*config.thresholds.b_line_interaction(), 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stage_settings_carry_config_values() {
        let config = DramaturgConfig::default();
        let settings = config.stage_settings();
        assert_eq!(*settings.request_timeout(), Duration::from_secs(120));
        assert_eq!(*settings.retry().max_attempts(), 3);
        assert_eq!(settings.retry().backoff().len(), 2);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut config = DramaturgConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
