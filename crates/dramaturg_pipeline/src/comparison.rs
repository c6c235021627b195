//! Side-by-side comparison of pipeline configurations.

use crate::{DramaturgConfig, MetricsSnapshot, Pipeline, PipelineResult};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use dramaturg_core::Script;
use dramaturg_error::ProviderError;
use dramaturg_interface::{DramaturgDriver, PromptLibrary};
use dramaturg_models::{Provider, create_driver};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One configuration under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct PipelineVariant {
    /// Label shown in reports
    name: String,
    /// Provider to call
    provider: Provider,
    /// Model override; the provider default when unset
    #[serde(default)]
    model: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    temperature: f32,
    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    4096
}

impl PipelineVariant {
    /// Variant with the provider's default model and deterministic sampling.
    pub fn new(name: impl Into<String>, provider: Provider) -> Self {
        Self {
            name: name.into(),
            provider,
            model: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
        }
    }

    /// Uses a specific model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Uses a specific temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Uses a specific completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// How one variant fared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantResult {
    /// The variant
    pub variant: PipelineVariant,
    /// Whether all stages completed
    pub success: bool,
    /// Wall-clock seconds
    pub duration_secs: f64,
    /// Chains found by the discoverer
    pub tcc_count: usize,
    /// Mean discoverer confidence, zero without output
    pub mean_confidence: f64,
    /// Run metrics
    pub metrics: MetricsSnapshot,
    /// Stage-fatal errors
    pub errors: Vec<String>,
}

impl VariantResult {
    fn from_run(variant: PipelineVariant, result: &PipelineResult) -> Self {
        let discovered = result.state.discoverer_output.as_ref();
        Self {
            variant,
            success: result.is_success(),
            duration_secs: result.metrics.total_duration_secs,
            tcc_count: discovered.map(|d| d.tccs.len()).unwrap_or(0),
            mean_confidence: discovered.map(|d| d.mean_confidence()).unwrap_or(0.0),
            metrics: result.metrics.clone(),
            errors: result.state.errors.clone(),
        }
    }

    fn setup_failed(variant: PipelineVariant, error: String) -> Self {
        Self {
            variant,
            success: false,
            duration_secs: 0.0,
            tcc_count: 0,
            mean_confidence: 0.0,
            metrics: MetricsSnapshot::default(),
            errors: vec![error],
        }
    }
}

/// Outcome of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    /// Identifies the comparison
    pub comparison_id: Uuid,
    /// Label of the analysed script
    pub script_name: String,
    /// When the comparison finished
    pub timestamp: DateTime<Utc>,
    /// One entry per variant, in input order
    pub results: Vec<VariantResult>,
    /// Name of the best variant, `None` when every variant failed
    pub winner: Option<String>,
}

/// Builds the driver for a variant.
pub type DriverFactory = Arc<
    dyn Fn(&PipelineVariant, Duration) -> Result<Arc<dyn DramaturgDriver>, ProviderError>
        + Send
        + Sync,
>;

/// Runs the pipeline once per variant, concurrently, on the same script.
///
/// Each run owns its own state and metrics collector; only the prompts and
/// base settings are shared.
#[derive(Clone)]
pub struct VariantComparison {
    config: DramaturgConfig,
    prompts: Arc<dyn PromptLibrary>,
    factory: DriverFactory,
}

impl VariantComparison {
    /// Comparison that builds real provider drivers from the environment.
    pub fn new(config: DramaturgConfig, prompts: Arc<dyn PromptLibrary>) -> Self {
        let factory: DriverFactory = Arc::new(|variant: &PipelineVariant, timeout: Duration| {
            create_driver(*variant.provider(), variant.model().as_deref(), timeout)
        });
        Self {
            config,
            prompts,
            factory,
        }
    }

    /// Replaces the driver factory.
    pub fn with_driver_factory(mut self, factory: DriverFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Runs every variant and picks a winner.
    #[instrument(skip(self, script, variants), fields(variants = variants.len()))]
    pub async fn compare(
        &self,
        script: &Script,
        script_name: &str,
        variants: &[PipelineVariant],
    ) -> ComparisonReport {
        let runs = variants
            .iter()
            .cloned()
            .map(|variant| self.run_variant(script, variant));
        let results = join_all(runs).await;
        let winner = pick_winner(&results).map(|r| r.variant.name.clone());
        info!(winner = winner.as_deref().unwrap_or("none"), "Comparison complete");

        ComparisonReport {
            comparison_id: Uuid::new_v4(),
            script_name: script_name.to_string(),
            timestamp: Utc::now(),
            results,
            winner,
        }
    }

    async fn run_variant(&self, script: &Script, variant: PipelineVariant) -> VariantResult {
        let timeout = Duration::from_secs(*self.config.llm.request_timeout_secs());
        let driver = match (self.factory)(&variant, timeout) {
            Ok(driver) => driver,
            Err(e) => {
                warn!(variant = %variant.name, error = %e, "Could not create driver");
                return VariantResult::setup_failed(variant, e.to_string());
            }
        };
        let settings = self
            .config
            .stage_settings()
            .with_temperature(Some(variant.temperature))
            .with_max_tokens(Some(variant.max_tokens))
            .with_model(variant.model.clone());
        let pipeline = Pipeline::new(driver, Arc::clone(&self.prompts), settings);
        let result = pipeline.run(script.clone()).await;
        info!(
            variant = %variant.name,
            success = result.is_success(),
            duration_secs = result.metrics.total_duration_secs,
            "Variant finished"
        );
        VariantResult::from_run(variant, &result)
    }
}

/// Best successful result: highest mean confidence, then shortest duration.
pub fn pick_winner(results: &[VariantResult]) -> Option<&VariantResult> {
    results.iter().filter(|r| r.success).max_by(|a, b| {
        a.mean_confidence
            .partial_cmp(&b.mean_confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.duration_secs
                    .partial_cmp(&a.duration_secs)
                    .unwrap_or(Ordering::Equal)
            })
    })
}
