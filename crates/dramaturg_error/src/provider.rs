//! LLM provider error types and retry classification.

/// Provider-specific error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ProviderErrorKind {
    /// API key not found in environment
    #[display("{} environment variable not set", _0)]
    MissingApiKey(String),
    /// Provider name not recognised
    #[display("Unsupported provider: {}", _0)]
    UnsupportedProvider(String),
    /// Failed to build the HTTP client
    #[display("Failed to create client: {}", _0)]
    ClientCreation(String),
    /// Connection-level failure before a status was received
    #[display("Network error: {}", _0)]
    Network(String),
    /// Request exceeded its deadline
    #[display("Request timed out")]
    Timeout,
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// Provider answered but the body had no usable completion
    #[display("Invalid provider response: {}", _0)]
    InvalidResponse(String),
}

impl ProviderErrorKind {
    /// Check if this error type should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderErrorKind::HttpStatus { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500..=599)
            }
            ProviderErrorKind::Network(_) => true,
            ProviderErrorKind::Timeout => true,
            _ => false,
        }
    }

}

/// Provider error with source location tracking.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{ProviderError, ProviderErrorKind};
///
/// let err = ProviderError::new(ProviderErrorKind::MissingApiKey("DEEPSEEK_API_KEY".into()));
/// assert!(format!("{}", err).contains("DEEPSEEK_API_KEY"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Provider Error: {} at line {} in {}", kind, line, file)]
pub struct ProviderError {
    /// The kind of error that occurred
    pub kind: ProviderErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ProviderError {
    /// Create a new ProviderError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ProviderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Trait for errors that support retry logic.
///
/// Transient conditions (rate limits, 5xx, timeouts, malformed model output)
/// report `true`; permanent ones (bad credentials, explicit refusals) report
/// `false` and stop a retry loop immediately.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{ProviderError, ProviderErrorKind, RetryableError};
///
/// let err = ProviderError::new(ProviderErrorKind::HttpStatus {
///     status_code: 503,
///     message: "Service unavailable".to_string(),
/// });
/// assert!(err.is_retryable());
///
/// let err = ProviderError::new(ProviderErrorKind::HttpStatus {
///     status_code: 401,
///     message: "Unauthorized".to_string(),
/// });
/// assert!(!err.is_retryable());
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for ProviderError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
