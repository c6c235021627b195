//! Audit reports, modification logs and their application to a script.

use crate::{IntegrityViolation, InfoChange, KeyObject, RelationChange, Script};
use dramaturg_error::{SchemaError, SchemaErrorKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Most issues handed to the modifier in one run.
pub const MAX_AUDIT_ISSUES: usize = 10;

const ADD_WORDS: &[&str] = &["add", "append", "insert", "create", "new", "include", "attach"];
const MODIFY_WORDS: &[&str] = &[
    "modify", "update", "change", "replace", "edit", "set", "fix", "correct", "amend", "rewrite",
];
const DELETE_WORDS: &[&str] = &["delete", "remove", "drop", "clear", "erase", "strip"];
const NO_CHANGE_WORDS: &[&str] = &["", "none", "skip", "skipped", "no_change", "n/a", "na", "null"];

/// Kind of edit a modification makes.
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
pub enum ChangeType {
    /// Insert new content
    Add,
    /// Replace existing content
    Modify,
    /// Remove content
    Delete,
}

impl ChangeType {
    /// Maps free-form model wording onto a change type.
    ///
    /// The whole value is tried against the synonym table first, then each
    /// word in order; the first word with a mapping wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use dramaturg_core::ChangeType;
    ///
    /// assert_eq!(ChangeType::normalize("Append"), Some(ChangeType::Add));
    /// assert_eq!(ChangeType::normalize("remove the entry"), Some(ChangeType::Delete));
    /// assert_eq!(ChangeType::normalize("shuffle"), None);
    /// ```
    pub fn normalize(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_lowercase();
        Self::from_word(&lowered).or_else(|| {
            lowered
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .find_map(Self::from_word)
        })
    }

    fn from_word(word: &str) -> Option<Self> {
        if ADD_WORDS.contains(&word) {
            Some(ChangeType::Add)
        } else if MODIFY_WORDS.contains(&word) {
            Some(ChangeType::Modify)
        } else if DELETE_WORDS.contains(&word) {
            Some(ChangeType::Delete)
        } else {
            None
        }
    }
}

/// Extracts the `ISS_NNN` prefix from ids such as `ISS_001_fixed`.
///
/// # Examples
///
/// ```
/// use dramaturg_core::normalize_issue_id;
///
/// assert_eq!(normalize_issue_id("ISS_001_fixed").as_deref(), Some("ISS_001"));
/// assert_eq!(normalize_issue_id(" iss_002 ").as_deref(), Some("ISS_002"));
/// assert_eq!(normalize_issue_id("issue one"), None);
/// ```
pub fn normalize_issue_id(raw: &str) -> Option<String> {
    let upper = raw.trim().to_uppercase();
    let digits = upper.strip_prefix("ISS_")?;
    let head: String = digits.chars().take_while(char::is_ascii_digit).collect();
    (head.len() == 3).then(|| format!("ISS_{}", head))
}

/// How urgent an audit issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Breaks causality
    High,
    /// Weakens causality
    Medium,
    /// Cosmetic
    Low,
}

/// What an audit issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueCategory {
    /// A setup/payoff link is broken
    BrokenSetupPayoff,
    /// A revelation is not recorded
    MissingInfoChange,
    /// A relationship shift is only half recorded
    IncompleteRelationChange,
    /// A plot prop is not tracked
    MissingKeyObject,
}

/// Proposed repair for an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FixAction {
    /// Add the missing back-link
    AddPayoffReference,
    /// Record a revelation
    AddInfoChange,
    /// Record a relationship shift
    AddRelationChange,
    /// Track a prop
    AddKeyObject,
    /// Resolve an ordering contradiction
    FixConsistency,
}

/// A suggested edit attached to an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedFix {
    /// Repair kind
    pub action: FixAction,
    /// Scene to edit
    pub target_scene: String,
    /// Field path to edit
    pub field: String,
    /// Value to write
    pub value: Value,
}

/// One problem the modifier is asked to address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// `ISS_NNN`
    pub issue_id: String,
    /// Urgency
    pub severity: Severity,
    /// Problem area
    pub category: IssueCategory,
    /// Human-readable description
    pub description: String,
    /// Scenes involved
    pub affected_scenes: Vec<String>,
    /// Suggested repair
    pub suggested_fix: SuggestedFix,
}

/// Issues found in a script before modification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditReport {
    /// Issues, at most [`MAX_AUDIT_ISSUES`]
    pub issues: Vec<Issue>,
}

impl AuditReport {
    /// Builds a report from integrity violations, numbering issues from `ISS_001`.
    pub fn from_violations(violations: &[IntegrityViolation]) -> Self {
        let issues = violations
            .iter()
            .take(MAX_AUDIT_ISSUES)
            .enumerate()
            .map(|(i, violation)| issue_for(i + 1, violation))
            .collect();
        Self { issues }
    }

    /// True when there is nothing to fix.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

fn issue_for(number: usize, violation: &IntegrityViolation) -> Issue {
    let scene_id = violation.scene_id().to_string();
    let other = violation.other_scene().to_string();
    let (severity, suggested_fix) = match violation {
        IntegrityViolation::MissingReciprocal { .. } => (
            Severity::Medium,
            SuggestedFix {
                action: FixAction::AddPayoffReference,
                target_scene: other.clone(),
                field: "setup_payoff.payoff_from".to_string(),
                value: Value::String(scene_id.clone()),
            },
        ),
        IntegrityViolation::DanglingSetup { .. } | IntegrityViolation::SetupNotDownstream { .. } => (
            Severity::High,
            SuggestedFix {
                action: FixAction::FixConsistency,
                target_scene: scene_id.clone(),
                field: "setup_payoff.setup_for".to_string(),
                value: Value::String(other.clone()),
            },
        ),
        IntegrityViolation::DanglingPayoff { .. } | IntegrityViolation::PayoffNotUpstream { .. } => (
            Severity::High,
            SuggestedFix {
                action: FixAction::FixConsistency,
                target_scene: scene_id.clone(),
                field: "setup_payoff.payoff_from".to_string(),
                value: Value::String(other.clone()),
            },
        ),
    };
    Issue {
        issue_id: format!("ISS_{:03}", number),
        severity,
        category: IssueCategory::BrokenSetupPayoff,
        description: violation.to_string(),
        affected_scenes: vec![scene_id, other],
        suggested_fix,
    }
}

/// A log entry as the model wrote it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawModificationLogEntry {
    /// Issue addressed, possibly decorated
    pub issue_id: String,
    /// Whether the edit was made
    pub applied: bool,
    /// Scene edited
    #[serde(default)]
    pub scene_id: Option<String>,
    /// Field path edited
    #[serde(default)]
    pub field: Option<String>,
    /// Free-form change wording
    #[serde(default)]
    pub change_type: Option<String>,
    /// Previous value
    #[serde(default)]
    pub old_value: Option<Value>,
    /// New value
    #[serde(default)]
    pub new_value: Option<Value>,
    /// Explanation, usually for skips
    #[serde(default)]
    pub reason: Option<String>,
}

/// A normalised log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationLogEntry {
    /// `ISS_NNN`
    pub issue_id: String,
    /// Whether the edit was made
    pub applied: bool,
    /// Scene edited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    /// Field path edited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Kind of edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    /// Previous value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    /// New value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// Explanation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RawModificationLogEntry {
    /// Normalises the issue id and change type.
    ///
    /// Skipped entries may carry no change type or a placeholder such as
    /// `"none"`; applied entries must map to add, modify or delete.
    ///
    /// # Errors
    ///
    /// Returns an error for an unrecognisable issue id or change type.
    #[track_caller]
    pub fn normalize(self) -> Result<ModificationLogEntry, SchemaError> {
        let issue_id = normalize_issue_id(&self.issue_id)
            .ok_or_else(|| SchemaError::new(SchemaErrorKind::InvalidIssueId(self.issue_id.clone())))?;

        let change_type = match self.change_type.as_deref().map(str::trim) {
            None => None,
            Some(raw) if !self.applied && NO_CHANGE_WORDS.contains(&raw.to_lowercase().as_str()) => {
                None
            }
            Some(raw) => Some(ChangeType::normalize(raw).ok_or_else(|| {
                SchemaError::new(SchemaErrorKind::UnmappableChangeType(raw.to_string()))
            })?),
        };

        Ok(ModificationLogEntry {
            issue_id,
            applied: self.applied,
            scene_id: self.scene_id,
            field: self.field,
            change_type,
            old_value: self.old_value,
            new_value: self.new_value,
            reason: self.reason,
        })
    }
}

/// Counts describing the modifier's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModificationValidation {
    /// Issues in the audit report
    pub total_issues: usize,
    /// Issues fixed
    pub fixed: usize,
    /// Issues skipped
    pub skipped: usize,
    /// Integrity problems present after but not before modification
    #[serde(default)]
    pub new_issues_introduced: usize,
}

impl ModificationValidation {
    /// Checks that fixed plus skipped equals the total.
    #[track_caller]
    pub fn check_counts(&self) -> Result<(), SchemaError> {
        if self.fixed + self.skipped != self.total_issues {
            return Err(SchemaError::new(SchemaErrorKind::SummaryMismatch {
                fixed: self.fixed,
                skipped: self.skipped,
                total: self.total_issues,
            }));
        }
        Ok(())
    }
}

/// The modifier's response envelope. Any script the model echoes back is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawModifierResponse {
    /// Edits as written by the model
    #[serde(default)]
    pub modification_log: Vec<RawModificationLogEntry>,
    /// Self-reported counts
    pub validation: ModificationValidation,
}

/// Stage 3 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierOutput {
    /// The script with the log applied
    pub modified_script: Script,
    /// Normalised edits
    pub modification_log: Vec<ModificationLogEntry>,
    /// Counts, with `new_issues_introduced` recomputed
    pub validation: ModificationValidation,
}

/// Applies the applied entries of a log, in order, to a copy of `script`.
///
/// Every entry naming a scene must name one present in the working copy.
/// Supported fields are `setup_payoff.setup_for`, `setup_payoff.payoff_from`,
/// `key_events`, `characters`, `info_change`, `relation_change`, `key_object`,
/// `scene_mission` and `setting`.
///
/// # Errors
///
/// Returns the first entry that cannot be applied.
pub fn apply_modifications(
    script: &Script,
    log: &[ModificationLogEntry],
) -> Result<Script, SchemaError> {
    let mut working = script.clone();
    for entry in log {
        if let Some(scene_id) = entry.scene_id.as_ref() {
            if !working.contains(scene_id) {
                return Err(SchemaError::new(SchemaErrorKind::UnknownScene {
                    owner: entry.issue_id.clone(),
                    scene_id: scene_id.clone(),
                }));
            }
        }
        if !entry.applied {
            continue;
        }
        let (Some(scene_id), Some(field), Some(change)) =
            (&entry.scene_id, &entry.field, entry.change_type)
        else {
            return Err(SchemaError::new(SchemaErrorKind::IncompleteEntry(
                entry.issue_id.clone(),
            )));
        };
        let Some(scene) = working.scene_mut(scene_id) else {
            continue;
        };
        let invalid = |reason: String| {
            SchemaError::new(SchemaErrorKind::InvalidFieldValue {
                scene_id: scene_id.clone(),
                field: field.clone(),
                reason,
            })
        };
        let result = match field.trim() {
            "setup_payoff.setup_for" | "setup_for" => {
                edit_list(&mut scene.setup_payoff.setup_for, change, entry)
            }
            "setup_payoff.payoff_from" | "payoff_from" => {
                edit_list(&mut scene.setup_payoff.payoff_from, change, entry)
            }
            "key_events" => edit_list(&mut scene.key_events, change, entry),
            "characters" => edit_list(&mut scene.characters, change, entry),
            "info_change" => edit_list::<InfoChange>(&mut scene.info_change, change, entry),
            "relation_change" => {
                edit_list::<RelationChange>(&mut scene.relation_change, change, entry)
            }
            "key_object" => edit_list::<KeyObject>(&mut scene.key_object, change, entry),
            "scene_mission" => match change {
                ChangeType::Delete => {
                    scene.scene_mission = None;
                    Ok(())
                }
                _ => decode_text(entry).map(|text| scene.scene_mission = Some(text)),
            },
            "setting" => match change {
                ChangeType::Delete => Err("setting cannot be deleted".to_string()),
                _ => decode_text(entry).map(|text| scene.setting = text),
            },
            _ => {
                return Err(SchemaError::new(SchemaErrorKind::UnsupportedField {
                    scene_id: scene_id.clone(),
                    field: field.clone(),
                }));
            }
        };
        result.map_err(invalid)?;
    }
    Ok(working)
}

fn decode_text(entry: &ModificationLogEntry) -> Result<String, String> {
    match &entry.new_value {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(other) => Err(format!("expected a string, got {}", other)),
        None => Err("new_value is required".to_string()),
    }
}

fn decode_items<T: DeserializeOwned>(value: &Value) -> Result<Vec<T>, String> {
    let values = match value {
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
        .collect()
}

fn edit_list<T>(list: &mut Vec<T>, change: ChangeType, entry: &ModificationLogEntry) -> Result<(), String>
where
    T: DeserializeOwned + PartialEq,
{
    match change {
        ChangeType::Add => {
            let value = entry.new_value.as_ref().ok_or("new_value is required")?;
            for item in decode_items::<T>(value)? {
                if !list.contains(&item) {
                    list.push(item);
                }
            }
        }
        ChangeType::Delete => match entry.old_value.as_ref().or(entry.new_value.as_ref()) {
            None | Some(Value::Null) => list.clear(),
            Some(value) => {
                let doomed = decode_items::<T>(value)?;
                list.retain(|item| !doomed.contains(item));
            }
        },
        ChangeType::Modify => {
            let new_value = entry.new_value.as_ref().ok_or("new_value is required")?;
            match (&entry.old_value, new_value) {
                (Some(old), new) if !old.is_array() && !old.is_null() && !new.is_array() => {
                    let old: T = serde_json::from_value(old.clone()).map_err(|e| e.to_string())?;
                    let new: T = serde_json::from_value(new.clone()).map_err(|e| e.to_string())?;
                    let slot = list
                        .iter_mut()
                        .find(|item| **item == old)
                        .ok_or("old_value not found")?;
                    *slot = new;
                }
                (_, new) => *list = decode_items::<T>(new)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scene;
    use serde_json::json;

    fn script() -> Script {
        let scene = |id: &str| {
            Scene::builder()
                .scene_id(id)
                .setting("Harbour")
                .key_events(vec!["boat arrives".to_string()])
                .build()
                .unwrap()
        };
        let mut first = scene("S01");
        first.setup_payoff.setup_for.push("S02".to_string());
        Script::new(vec![first, scene("S02")])
    }

    fn entry(value: Value) -> ModificationLogEntry {
        serde_json::from_value::<RawModificationLogEntry>(value)
            .unwrap()
            .normalize()
            .unwrap()
    }

    #[test]
    fn descriptive_change_types_normalize() {
        assert_eq!(ChangeType::normalize("remove the entry"), Some(ChangeType::Delete));
        assert_eq!(ChangeType::normalize("insert"), Some(ChangeType::Add));
        assert_eq!(ChangeType::normalize("UPDATE"), Some(ChangeType::Modify));
        assert_eq!(ChangeType::normalize("add_to_list"), Some(ChangeType::Add));
        assert_eq!(ChangeType::normalize("teleport"), None);
    }

    #[test]
    fn skipped_entries_tolerate_placeholders() {
        let skipped = entry(json!({"issue_id": "ISS_003_skipped", "applied": false, "change_type": "none"}));
        assert_eq!(skipped.issue_id, "ISS_003");
        assert_eq!(skipped.change_type, None);

        let raw: RawModificationLogEntry =
            serde_json::from_value(json!({"issue_id": "ISS_004", "applied": true, "change_type": "none"}))
                .unwrap();
        assert!(raw.normalize().is_err());
    }

    #[test]
    fn audit_report_numbers_and_caps_issues() {
        let violations: Vec<_> = (0..12)
            .map(|i| IntegrityViolation::MissingReciprocal {
                scene_id: format!("S{:02}", i),
                target: format!("S{:02}", i + 1),
            })
            .collect();
        let report = AuditReport::from_violations(&violations);
        assert_eq!(report.issues.len(), MAX_AUDIT_ISSUES);
        assert_eq!(report.issues[0].issue_id, "ISS_001");
        assert_eq!(report.issues[9].issue_id, "ISS_010");
        assert_eq!(report.issues[0].suggested_fix.target_scene, "S01");
    }

    #[test]
    fn add_back_link_repairs_reciprocity() {
        let log = vec![entry(json!({
            "issue_id": "ISS_001",
            "applied": true,
            "scene_id": "S02",
            "field": "setup_payoff.payoff_from",
            "change_type": "append",
            "new_value": "S01"
        }))];
        let original = script();
        let modified = apply_modifications(&original, &log).unwrap();
        assert_eq!(modified.scenes[1].setup_payoff.payoff_from, vec!["S01".to_string()]);
        assert!(original.scenes[1].setup_payoff.payoff_from.is_empty());
    }

    #[test]
    fn delete_without_value_clears_list() {
        let log = vec![entry(json!({
            "issue_id": "ISS_001",
            "applied": true,
            "scene_id": "S01",
            "field": "setup_for",
            "change_type": "remove"
        }))];
        let modified = apply_modifications(&script(), &log).unwrap();
        assert!(modified.scenes[0].setup_payoff.setup_for.is_empty());
    }

    #[test]
    fn modify_replaces_matching_item() {
        let log = vec![entry(json!({
            "issue_id": "ISS_001",
            "applied": true,
            "scene_id": "S01",
            "field": "key_events",
            "change_type": "replace",
            "old_value": "boat arrives",
            "new_value": "boat sinks"
        }))];
        let modified = apply_modifications(&script(), &log).unwrap();
        assert_eq!(modified.scenes[0].key_events, vec!["boat sinks".to_string()]);
    }

    #[test]
    fn unknown_scene_and_field_are_rejected() {
        let unknown_scene = vec![entry(json!({
            "issue_id": "ISS_001", "applied": true, "scene_id": "S09",
            "field": "key_events", "change_type": "add", "new_value": "x"
        }))];
        assert!(apply_modifications(&script(), &unknown_scene).is_err());

        let unknown_field = vec![entry(json!({
            "issue_id": "ISS_001", "applied": true, "scene_id": "S01",
            "field": "weather", "change_type": "add", "new_value": "rain"
        }))];
        assert!(apply_modifications(&script(), &unknown_field).is_err());
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let counts = ModificationValidation {
            total_issues: 3,
            fixed: 1,
            skipped: 1,
            new_issues_introduced: 0,
        };
        assert!(counts.check_counts().is_err());
    }
}
