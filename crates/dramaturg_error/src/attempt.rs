//! Errors from a single stage attempt.

use crate::{ProviderErrorKind, RetryableError, SanitizeErrorKind, SchemaErrorKind};

/// Why one attempt at a stage produced no usable output.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum AttemptErrorKind {
    /// No JSON object could be extracted
    #[display("{}", _0)]
    Sanitize(SanitizeErrorKind),
    /// Extracted text was not valid JSON for the stage schema
    #[display("JSON parse failed: {}", _0)]
    Parse(String),
    /// Parsed output broke a stage rule
    #[display("schema violation: {}", _0)]
    Schema(SchemaErrorKind),
    /// The provider call failed
    #[display("{}", _0)]
    Provider(ProviderErrorKind),
    /// The provider call exceeded the stage deadline
    #[display("LLM call timed out after {}s", _0)]
    Timeout(u64),
    /// The model answered with an explicit error instead of output
    #[display("model reported an error: {}", _0)]
    Rejected(String),
}

impl AttemptErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptErrorKind::Provider(kind) => kind.is_retryable(),
            AttemptErrorKind::Rejected(_) => false,
            _ => true,
        }
    }
}

/// Attempt error with source location tracking.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{AttemptError, AttemptErrorKind, RetryableError};
///
/// let err = AttemptError::new(AttemptErrorKind::Parse("EOF while parsing".into()));
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Attempt Error: {} at line {} in {}", kind, line, file)]
pub struct AttemptError {
    /// The kind of error that occurred
    pub kind: AttemptErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl AttemptError {
    /// Create a new AttemptError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: AttemptErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for AttemptError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
