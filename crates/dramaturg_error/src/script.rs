//! Input script validation errors.
//!
//! These are fatal: a script that fails them is rejected before any model call.

/// Structural problems with an input script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ScriptErrorKind {
    /// Two scenes share an id
    #[display("Duplicate scene_id: {}", _0)]
    DuplicateSceneId(String),
    /// A scene id does not match `S\d+`
    #[display("Invalid scene_id format: {}", _0)]
    InvalidSceneId(String),
    /// A setup/payoff link points at a scene that does not exist
    #[display("Scene {} references unknown scene {} in {}", scene_id, target, field)]
    DanglingReference {
        /// Scene holding the reference
        scene_id: String,
        /// Field holding the reference
        field: String,
        /// Referenced scene id
        target: String,
    },
    /// A scene has no key events or more than seven
    #[display("Scene {} has {} key_events (expected 1-7)", scene_id, count)]
    KeyEventCount {
        /// Offending scene
        scene_id: String,
        /// Number of events found
        count: usize,
    },
    /// The script document could not be decoded
    #[display("Failed to parse script: {}", _0)]
    Parse(String),
    /// The script file could not be read
    #[display("Failed to read script: {}", _0)]
    Io(String),
}

/// Script validation error with source location tracking.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{ScriptError, ScriptErrorKind};
///
/// let err = ScriptError::new(ScriptErrorKind::DuplicateSceneId("S01".into()));
/// assert!(format!("{}", err).contains("S01"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Script Error: {} at line {} in {}", kind, line, file)]
pub struct ScriptError {
    /// The kind of error that occurred
    pub kind: ScriptErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ScriptError {
    /// Create a new ScriptError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ScriptErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
