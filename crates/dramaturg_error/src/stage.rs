//! Stage-fatal errors surfaced to the pipeline orchestrator.

use crate::{AttemptErrorKind, ScriptErrorKind};

/// Why a stage produced no output.
#[derive(Debug, Clone, PartialEq, derive_more::Display)]
pub enum StageErrorKind {
    /// Required upstream output is missing
    #[display("missing upstream output: {} must run first", _0)]
    MissingUpstream(String),
    /// The input script failed validation
    #[display("invalid script: {}", _0)]
    InvalidScript(ScriptErrorKind),
    /// Every attempt failed with a retryable error
    #[display("retry budget exhausted, last error: {}", _0)]
    Exhausted(AttemptErrorKind),
    /// An attempt failed with a permanent error
    #[display("permanent failure: {}", _0)]
    Permanent(AttemptErrorKind),
    /// The run was cancelled
    #[display("cancelled")]
    Cancelled,
}

/// Stage failure naming the stage and the number of attempts made.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{AttemptErrorKind, StageError, StageErrorKind};
///
/// let err = StageError::new(
///     "discoverer",
///     3,
///     StageErrorKind::Exhausted(AttemptErrorKind::Parse("trailing comma".into())),
/// );
/// let text = format!("{}", err);
/// assert!(text.contains("discoverer"));
/// assert!(text.contains("3 attempts"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display(
    "Stage Error [{} after {} attempts]: {} at line {} in {}",
    stage,
    attempts,
    kind,
    line,
    file
)]
pub struct StageError {
    /// Stage that failed
    pub stage: String,
    /// Model calls made before giving up
    pub attempts: usize,
    /// The kind of error that occurred
    pub kind: StageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StageError {
    /// Create a new StageError with automatic location tracking.
    #[track_caller]
    pub fn new(stage: impl Into<String>, attempts: usize, kind: StageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            stage: stage.into(),
            attempts,
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
