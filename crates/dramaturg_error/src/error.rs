//! Top-level error wrapper types.

use crate::{
    AttemptError, ConfigError, JsonError, ProviderError, SanitizeError, SchemaError, ScriptError,
    StageError, StorageError,
};

/// Every error the dramaturg crates can raise.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{ConfigError, DramaturgError};
///
/// let err: DramaturgError = ConfigError::new("bad threshold").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum DramaturgErrorKind {
    /// Input script rejected
    #[from(ScriptError)]
    Script(ScriptError),
    /// JSON extraction failed
    #[from(SanitizeError)]
    Sanitize(SanitizeError),
    /// Stage output broke a rule
    #[from(SchemaError)]
    Schema(SchemaError),
    /// Provider call failed
    #[from(ProviderError)]
    Provider(ProviderError),
    /// Single stage attempt failed
    #[from(AttemptError)]
    Attempt(AttemptError),
    /// Stage failed fatally
    #[from(StageError)]
    Stage(StageError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Run history error
    #[from(StorageError)]
    Storage(StorageError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
}

/// Dramaturg error with kind discrimination.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{ConfigError, DramaturgResult};
///
/// fn might_fail() -> DramaturgResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Dramaturg Error: {}", _0)]
pub struct DramaturgError(Box<DramaturgErrorKind>);

impl DramaturgError {
    /// Create a new error from a kind.
    pub fn new(kind: DramaturgErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &DramaturgErrorKind {
        &self.0
    }
}

impl<T> From<T> for DramaturgError
where
    T: Into<DramaturgErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for dramaturg operations.
pub type DramaturgResult<T> = std::result::Result<T, DramaturgError>;
