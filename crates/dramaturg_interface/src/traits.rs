//! Trait definitions for LLM backends and prompt resources.

use async_trait::async_trait;
use dramaturg_core::{GenerateRequest, GenerateResponse, Stage};
use dramaturg_error::DramaturgResult;

/// Core trait that all LLM backends must implement.
///
/// Implementations return the provider's raw completion text; stages do all
/// JSON extraction themselves so no provider needs its own parsing.
#[async_trait]
pub trait DramaturgDriver: Send + Sync {
    /// Generate a completion for the request.
    async fn generate(&self, req: &GenerateRequest) -> DramaturgResult<GenerateResponse>;

    /// Provider name (e.g., "deepseek", "anthropic", "openai").
    fn provider_name(&self) -> &'static str;

    /// Model identifier (e.g., "deepseek-chat").
    fn model_name(&self) -> &str;
}

/// Source of the instruction prompt for each stage.
///
/// Prompt text is opaque to the pipeline; it is sent as the system message.
pub trait PromptLibrary: Send + Sync {
    /// Instruction prompt for a stage.
    fn prompt(&self, stage: Stage) -> &str;
}
