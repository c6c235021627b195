//! Error types for the dramaturg screenplay analysis pipeline.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Errors that a stage may recover from by asking the model again implement
//! [`RetryableError`].
//!
//! # Examples
//!
//! ```
//! use dramaturg_error::{DramaturgResult, ScriptError, ScriptErrorKind};
//!
//! fn load() -> DramaturgResult<()> {
//!     Err(ScriptError::new(ScriptErrorKind::DuplicateSceneId("S03".into())))?
//! }
//!
//! match load() {
//!     Ok(()) => println!("loaded"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod attempt;
mod config;
mod error;
mod json;
mod provider;
mod sanitize;
mod schema;
mod script;
mod stage;
mod storage;

pub use attempt::{AttemptError, AttemptErrorKind};
pub use config::ConfigError;
pub use error::{DramaturgError, DramaturgErrorKind, DramaturgResult};
pub use json::JsonError;
pub use provider::{ProviderError, ProviderErrorKind, RetryableError};
pub use sanitize::{SanitizeError, SanitizeErrorKind};
pub use schema::{SchemaError, SchemaErrorKind};
pub use script::{ScriptError, ScriptErrorKind};
pub use stage::{StageError, StageErrorKind};
pub use storage::{StorageError, StorageErrorKind};
