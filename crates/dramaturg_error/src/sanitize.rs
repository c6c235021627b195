//! Response sanitizer error types.

/// Ways extraction of a JSON object from model text can fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum SanitizeErrorKind {
    /// The response contained no `{` at all
    #[display("No JSON object found in response ({} chars)", _0)]
    NoJsonObject(usize),
    /// An object opened but its braces never balanced
    #[display("Unterminated JSON object starting at byte {}", _0)]
    Unterminated(usize),
}

/// Sanitization error with source location tracking.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{SanitizeError, SanitizeErrorKind};
///
/// let err = SanitizeError::new(SanitizeErrorKind::NoJsonObject(12));
/// assert!(format!("{}", err).contains("No JSON object"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Sanitize Error: {} at line {} in {}", kind, line, file)]
pub struct SanitizeError {
    /// The kind of error that occurred
    pub kind: SanitizeErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SanitizeError {
    /// Create a new SanitizeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SanitizeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
