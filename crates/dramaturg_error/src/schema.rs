//! Business-rule violations in parsed stage output.

/// A parsed stage output that breaks one of its stage's rules.
///
/// Each variant names the rule so it can be fed back to the model verbatim.
#[derive(Debug, Clone, PartialEq, PartialOrd, derive_more::Display)]
pub enum SchemaErrorKind {
    /// Discoverer returned the wrong number of chains
    #[display("expected 1-5 tccs, got {}", _0)]
    TccCount(usize),
    /// Discoverer returned no chains and no explanation
    #[display("tccs is empty but metadata.error is not set")]
    EmptyWithoutError,
    /// Chain id does not match `TCC_\d{2}`
    #[display("tcc_id {} does not match TCC_NN", _0)]
    InvalidTccId(String),
    /// Chain id repeated
    #[display("duplicate tcc_id {}", _0)]
    DuplicateTccId(String),
    /// Fewer than two evidence scenes
    #[display("{} has {} evidence scenes (need at least 2)", tcc_id, count)]
    InsufficientEvidence {
        /// Offending chain
        tcc_id: String,
        /// Number of distinct scenes given
        count: usize,
    },
    /// A referenced scene is not in the script
    #[display("{} references unknown scene {}", owner, scene_id)]
    UnknownScene {
        /// Chain id or log entry that holds the reference
        owner: String,
        /// Missing scene id
        scene_id: String,
    },
    /// Confidence outside [0, 1]
    #[display("{} confidence {} is outside [0, 1]", tcc_id, confidence)]
    ConfidenceOutOfRange {
        /// Offending chain
        tcc_id: String,
        /// Reported confidence
        confidence: f64,
    },
    /// Super-objective too short or too long
    #[display("{} super_objective has {} chars (expected 10-50)", tcc_id, length)]
    SuperObjectiveLength {
        /// Offending chain
        tcc_id: String,
        /// Character count
        length: usize,
    },
    /// Auditor did not return exactly one A-line
    #[display("expected exactly one a_line, got {}", _0)]
    ALineCount(usize),
    /// Ranking names a chain the discoverer never produced
    #[display("ranking references unknown tcc {}", _0)]
    UnknownTcc(String),
    /// A chain was ranked more than once
    #[display("tcc {} is ranked more than once", _0)]
    DuplicateRanking(String),
    /// Reported score is negative
    #[display("{} has negative {} {}", tcc_id, field, value)]
    NegativeScore {
        /// Offending chain
        tcc_id: String,
        /// Score or metric name
        field: String,
        /// Reported value
        value: f64,
    },
    /// Protagonist or primary antagonist missing
    #[display("{} forces.{} is empty", tcc_id, field)]
    EmptyForce {
        /// Offending chain
        tcc_id: String,
        /// `protagonist` or `primary_antagonist`
        field: String,
    },
    /// Modification change type has no mapping
    #[display("change_type {:?} cannot be mapped to add/modify/delete", _0)]
    UnmappableChangeType(String),
    /// Issue id does not look like `ISS_NNN`
    #[display("issue_id {:?} does not match ISS_NNN", _0)]
    InvalidIssueId(String),
    /// Modification targets a field the modifier cannot edit
    #[display("scene {} field {:?} cannot be modified", scene_id, field)]
    UnsupportedField {
        /// Target scene
        scene_id: String,
        /// Requested field path
        field: String,
    },
    /// Modification value has the wrong shape for its field
    #[display("scene {} field {} got an invalid value: {}", scene_id, field, reason)]
    InvalidFieldValue {
        /// Target scene
        scene_id: String,
        /// Requested field path
        field: String,
        /// Decoder message
        reason: String,
    },
    /// Applied log entry without scene, field or change type
    #[display("applied entry {} needs scene_id, field and change_type", _0)]
    IncompleteEntry(String),
    /// fixed + skipped disagrees with total_issues
    #[display("fixed ({}) + skipped ({}) != total_issues ({})", fixed, skipped, total)]
    SummaryMismatch {
        /// Reported fixed count
        fixed: usize,
        /// Reported skipped count
        skipped: usize,
        /// Reported total
        total: usize,
    },
    /// Applying the log left the script breaking its own invariants
    #[display("modified script is invalid: {}", _0)]
    InvalidModifiedScript(crate::ScriptErrorKind),
}

/// Schema violation with source location tracking.
///
/// # Examples
///
/// ```
/// use dramaturg_error::{SchemaError, SchemaErrorKind};
///
/// let err = SchemaError::new(SchemaErrorKind::ALineCount(2));
/// assert!(format!("{}", err).contains("exactly one a_line"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Schema Error: {} at line {} in {}", kind, line, file)]
pub struct SchemaError {
    /// The kind of error that occurred
    pub kind: SchemaErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl SchemaError {
    /// Create a new SchemaError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: SchemaErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
