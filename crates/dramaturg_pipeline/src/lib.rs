//! Screenplay analysis pipeline for dramaturg.
//!
//! Runs a [`Script`](dramaturg_core::Script) through three model-driven
//! stages and turns each free-text reply into validated structured data.
//!
//! # Features
//!
//! - **Response sanitizer**: pulls one JSON object out of prose, fences and noise
//! - **Retry policy**: bounded attempts with exponential backoff and self-correction
//! - **Stage actors**: discoverer, auditor and modifier with their business rules
//! - **State machine**: sequential orchestration that keeps partial results on failure
//! - **Metrics**: per-run collectors plus an append-only cross-run history
//! - **Variant comparison**: the same script under several provider settings
//!
//! # Example
//!
//! ```no_run
//! use dramaturg_core::Script;
//! use dramaturg_pipeline::{DramaturgConfig, Pipeline};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DramaturgConfig::load()?;
//! let pipeline = Pipeline::from_config(&config)?;
//!
//! let script = Script::from_json(&std::fs::read_to_string("script.json")?)?;
//! let result = pipeline.run(script).await;
//! if let Some(modified) = &result.state.modifier_output {
//!     println!("{} modifications", modified.modification_log.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actors;
mod comparison;
mod config;
mod history;
mod metrics;
mod orchestrator;
mod prompts;
mod retry;
mod sanitizer;
mod state;

pub use actors::{
    Auditor, Discoverer, Modifier, StageActor, StageContext, StageRun, StageSettings, advance,
};
pub use comparison::{
    ComparisonReport, DriverFactory, PipelineVariant, VariantComparison, VariantResult,
    pick_winner,
};
pub use config::{DramaturgConfig, HistoryConfig, LlmConfig, PromptsConfig, RetryConfig};
pub use history::{HistoryStats, MetricsStore, RunRecord, StageAverages};
pub use metrics::{MetricsCollector, MetricsSnapshot, StageStats};
pub use orchestrator::{INPUT_STAGE, Pipeline, PipelineResult, StageResult};
pub use prompts::{FilePromptLibrary, InMemoryPromptLibrary};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
pub use sanitizer::sanitize;
pub use state::{PipelineStage, PipelineState, TraceEntry};
