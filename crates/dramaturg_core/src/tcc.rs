//! Theatrical conflict chains and the discoverer's output.

use crate::Script;
use derive_getters::Getters;
use dramaturg_error::{SchemaError, SchemaErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Maximum number of chains one discoverer run may return.
pub const MAX_TCCS: usize = 5;
/// Minimum distinct evidence scenes per chain.
pub const MIN_EVIDENCE_SCENES: usize = 2;
/// Allowed super-objective length in characters.
pub const SUPER_OBJECTIVE_CHARS: std::ops::RangeInclusive<usize> = 10..=50;

/// Returns true for ids of the form `TCC_` + two digits.
pub fn is_tcc_id(id: &str) -> bool {
    id.strip_prefix("TCC_")
        .is_some_and(|digits| digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// What the chain's conflict is fundamentally about.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConflictType {
    /// Character against character
    Interpersonal,
    /// Character against self
    Internal,
    /// Value system against value system
    Ideological,
}

/// An independent story thread identified by the discoverer.
///
/// Parsing only checks structure. [`Tcc::new`] and [`Tcc::validate`] enforce
/// the id pattern, evidence minimum, confidence range and objective length.
///
/// # Examples
///
/// ```
/// use dramaturg_core::{ConflictType, Tcc};
///
/// let tcc = Tcc::new(
///     "TCC_01",
///     "Ann must expose her brother",
///     ConflictType::Interpersonal,
///     vec!["S01".into(), "S04".into()],
///     0.85,
/// )
/// .unwrap();
/// assert_eq!(tcc.tcc_id(), "TCC_01");
///
/// let too_thin = Tcc::new(
///     "TCC_02",
///     "Ben wants to leave town",
///     ConflictType::Internal,
///     vec!["S02".into()],
///     0.7,
/// );
/// assert!(too_thin.is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Tcc {
    /// Chain id, `TCC_NN`
    tcc_id: String,
    /// The chain's driving goal
    super_objective: String,
    /// Kind of conflict
    core_conflict_type: ConflictType,
    /// Scenes where the chain appears
    evidence_scenes: Vec<String>,
    /// Model confidence in [0, 1]
    confidence: f64,
}

impl Tcc {
    /// Builds a chain, rejecting it if it breaks any per-chain rule.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] naming the broken rule.
    #[track_caller]
    pub fn new(
        tcc_id: impl Into<String>,
        super_objective: impl Into<String>,
        core_conflict_type: ConflictType,
        evidence_scenes: Vec<String>,
        confidence: f64,
    ) -> Result<Self, SchemaError> {
        let tcc = Self {
            tcc_id: tcc_id.into(),
            super_objective: super_objective.into(),
            core_conflict_type,
            evidence_scenes,
            confidence,
        };
        tcc.validate()?;
        Ok(tcc)
    }

    /// Distinct evidence scenes.
    pub fn evidence_set(&self) -> BTreeSet<&str> {
        self.evidence_scenes.iter().map(String::as_str).collect()
    }

    /// Checks the rules that hold for a chain on its own.
    #[track_caller]
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !is_tcc_id(&self.tcc_id) {
            return Err(SchemaError::new(SchemaErrorKind::InvalidTccId(
                self.tcc_id.clone(),
            )));
        }
        let count = self.evidence_set().len();
        if count < MIN_EVIDENCE_SCENES {
            return Err(SchemaError::new(SchemaErrorKind::InsufficientEvidence {
                tcc_id: self.tcc_id.clone(),
                count,
            }));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaError::new(SchemaErrorKind::ConfidenceOutOfRange {
                tcc_id: self.tcc_id.clone(),
                confidence: self.confidence,
            }));
        }
        let length = self.super_objective.trim().chars().count();
        if !SUPER_OBJECTIVE_CHARS.contains(&length) {
            return Err(SchemaError::new(SchemaErrorKind::SuperObjectiveLength {
                tcc_id: self.tcc_id.clone(),
                length,
            }));
        }
        Ok(())
    }
}

/// Bookkeeping the discoverer reports alongside its chains.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscovererMetadata {
    /// Scenes the model looked at
    #[serde(default)]
    pub total_scenes_analyzed: usize,
    /// Whether setup/payoff data was available as primary evidence
    #[serde(default)]
    pub primary_evidence_available: bool,
    /// Set when chains were inferred from missions and key events instead
    #[serde(default)]
    pub fallback_mode: bool,
    /// Why fallback mode was used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Explanation when no chains could be found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stage 1 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscovererOutput {
    /// Identified chains
    pub tccs: Vec<Tcc>,
    /// Run bookkeeping
    #[serde(default)]
    pub metadata: DiscovererMetadata,
}

impl DiscovererOutput {
    /// Looks up a chain by id.
    pub fn tcc(&self, tcc_id: &str) -> Option<&Tcc> {
        self.tccs.iter().find(|t| t.tcc_id == tcc_id)
    }

    /// Mean confidence over all chains, zero when there are none.
    pub fn mean_confidence(&self) -> f64 {
        if self.tccs.is_empty() {
            return 0.0;
        }
        self.tccs.iter().map(|t| t.confidence).sum::<f64>() / self.tccs.len() as f64
    }

    /// Checks the discoverer's business rules against the input script.
    ///
    /// An empty chain list passes only when `metadata.error` explains it; the
    /// caller decides what to do with that explicit failure.
    ///
    /// # Errors
    ///
    /// Returns the first broken rule.
    #[track_caller]
    pub fn validate(&self, script: &Script) -> Result<(), SchemaError> {
        if self.tccs.is_empty() {
            return match self.metadata.error {
                Some(_) => Ok(()),
                None => Err(SchemaError::new(SchemaErrorKind::EmptyWithoutError)),
            };
        }
        if self.tccs.len() > MAX_TCCS {
            return Err(SchemaError::new(SchemaErrorKind::TccCount(self.tccs.len())));
        }

        let mut ids = HashSet::new();
        for tcc in &self.tccs {
            tcc.validate()?;
            if !ids.insert(tcc.tcc_id.as_str()) {
                return Err(SchemaError::new(SchemaErrorKind::DuplicateTccId(
                    tcc.tcc_id.clone(),
                )));
            }
            if let Some(missing) = tcc.evidence_scenes.iter().find(|s| !script.contains(s)) {
                return Err(SchemaError::new(SchemaErrorKind::UnknownScene {
                    owner: tcc.tcc_id.clone(),
                    scene_id: missing.clone(),
                }));
            }
        }
        Ok(())
    }
}
