//! Trait definitions for dramaturg.
//!
//! [`DramaturgDriver`] is the seam to LLM providers and [`PromptLibrary`] the
//! seam to stage instruction prompts. Both are object safe so a pipeline can
//! hold them as `Arc<dyn ...>`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{DramaturgDriver, PromptLibrary};
