//! Core data types for dramaturg.
//!
//! Scenes and scripts, conflict chains, rankings and modifications, plus the
//! pure functions that validate and score them. Parsing a stage response only
//! checks its shape; the business rules live in explicit `validate`/`resolve`
//! functions so each pass can be tested on its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod message;
mod modification;
mod ranking;
mod request;
mod role;
mod scene;
mod scoring;
mod stage;
mod tcc;
mod thresholds;
mod validation;

pub use message::Message;
pub use modification::{
    AuditReport, ChangeType, FixAction, Issue, IssueCategory, MAX_AUDIT_ISSUES,
    ModificationLogEntry, ModificationValidation, ModifierOutput, RawModificationLogEntry,
    RawModifierResponse, Severity, SuggestedFix, apply_modifications, normalize_issue_id,
};
pub use ranking::{
    ALineRanking, ALineReasoning, AuditorMetrics, AuditorOutput, BLineRanking, BLineReasoning,
    CLineRanking, CLineReasoning, Forces, OneOrMany, Rankings, RawAuditorResponse, RawRankings,
};
pub use request::{GenerateRequest, GenerateResponse, TokenUsage};
pub use role::Role;
pub use scene::{
    InfoChange, KeyObject, MAX_KEY_EVENTS, PerformanceNote, RelationChange, Scene, SceneBuilder,
    Script, SetupPayoff, is_scene_id,
};
pub use scoring::{
    calculate_a_line_interaction, calculate_heart_score, calculate_setup_payoff_density,
    calculate_spine_score, jaccard, overlap_ratio,
};
pub use stage::Stage;
pub use tcc::{
    ConflictType, DiscovererMetadata, DiscovererOutput, MAX_TCCS, MIN_EVIDENCE_SCENES,
    SUPER_OBJECTIVE_CHARS, Tcc, is_tcc_id,
};
pub use thresholds::{Thresholds, ThresholdsBuilder};
pub use validation::{
    IntegrityViolation, integrity_violations, merge_mirror_tccs, validate_scene_references,
    validate_setup_payoff_integrity, validate_tcc_independence,
};
