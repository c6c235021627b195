//! Dramaturg - screenplay conflict-chain analysis.
//!
//! Dramaturg runs a structured screenplay through three LLM-driven stages:
//! it discovers the independent Theatrical Conflict Chains (TCCs), ranks them
//! into A/B/C-lines, and proposes minimal setup/payoff repairs. Every model
//! reply is sanitized, parsed and validated before it is trusted.
//!
//! # Quick Start
//!
//! ```no_run
//! use dramaturg::{DramaturgConfig, Pipeline, Script};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DramaturgConfig::load()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let script = Script::from_json(&std::fs::read_to_string("script.json")?)?;
//!
//! let result = pipeline.run(script).await;
//! println!("completed: {}", result.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - `dramaturg_error` - Error types
//! - `dramaturg_core` - Scenes, chains, rankings and the pure validation rules
//! - `dramaturg_interface` - `DramaturgDriver` and `PromptLibrary` traits
//! - `dramaturg_models` - DeepSeek, OpenAI and Anthropic clients
//! - `dramaturg_pipeline` - Sanitizer, retry, stage actors and orchestration
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod observability;

pub use dramaturg_core::*;
pub use dramaturg_error::*;
pub use dramaturg_interface::*;
pub use dramaturg_models::{
    AnthropicClient, DEEPSEEK_BASE_URL, LlmMetrics, OPENAI_BASE_URL, OpenAICompatibleClient,
    Provider, create_driver, create_driver_with_key,
};
pub use dramaturg_pipeline::*;

pub use observability::init_tracing;
