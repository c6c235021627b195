//! Stage parsing rules exercised without a driver.

mod test_utils;

use dramaturg_core::{ChangeType, DiscovererOutput, IntegrityViolation, integrity_violations};
use dramaturg_error::{AttemptErrorKind, SchemaErrorKind};
use dramaturg_pipeline::{Auditor, Discoverer, Modifier, sanitize};
use std::collections::HashSet;
use test_utils::{
    AUDITOR_REPLY, DISCOVERER_REPLY, consistent_script, script_with_one_issue,
    single_scene_script,
};

fn discovered() -> DiscovererOutput {
    let json = sanitize(DISCOVERER_REPLY).unwrap();
    Discoverer::parse(&json, &script_with_one_issue(), false).unwrap()
}

#[test]
fn test_sanitizer_output_always_parses() {
    let inputs = [
        DISCOVERER_REPLY,
        AUDITOR_REPLY,
        "Sure! {\"a\": \"brace } inside\"} Hope this helps {not json}",
        "noise {\"x\": {\"y\": [1, 2, {\"z\": null}]}} trailing",
    ];
    for input in inputs {
        let json = sanitize(input).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_ok(), "{}", json);
        assert_eq!(sanitize(&json).unwrap(), json);
    }
}

#[test]
fn test_fallback_mode_when_setup_payoff_is_sparse() {
    assert!(Discoverer::fallback_mode(&single_scene_script(), 0.5));
    assert!(!Discoverer::fallback_mode(&script_with_one_issue(), 0.5));

    let json = sanitize(DISCOVERER_REPLY).unwrap();
    let output = Discoverer::parse(&json, &script_with_one_issue(), true).unwrap();
    assert!(output.metadata.fallback_mode);
    assert!(!output.metadata.primary_evidence_available);
    assert!(output.metadata.fallback_reason.is_some());
}

#[test]
fn test_unknown_evidence_scene_is_a_schema_error() {
    let json = r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Ann must expose the forger",
        "core_conflict_type": "interpersonal", "evidence_scenes": ["S01", "S09"], "confidence": 0.8}]}"#;
    let err = Discoverer::parse(json, &script_with_one_issue(), false).unwrap_err();
    assert!(matches!(
        err,
        AttemptErrorKind::Schema(SchemaErrorKind::UnknownScene { .. })
    ));
}

#[test]
fn test_weak_b_line_is_demoted() {
    let json = r#"{"rankings": {
        "a_line": {"tcc_id": "TCC_01", "spine_score": 9.0,
            "reasoning": {"scene_count": 3, "setup_payoff_density": 0.5, "drives_climax": true},
            "forces": {"protagonist": "Ann", "primary_antagonist": "The forger"}},
        "b_lines": [{"tcc_id": "TCC_02", "heart_score": 2.0,
            "reasoning": {"relation_change_count": 1, "a_line_interaction": 0.9, "theme_depth": 0.6},
            "forces": {"protagonist": "Ben", "primary_antagonist": "Ben's pride"}}]}}"#;

    // Interaction between TCC_02 and TCC_01 is 0.5; raise the bar above it.
    let (output, notes) =
        Auditor::parse(json, &discovered(), &script_with_one_issue(), 0.6).unwrap();
    assert!(output.rankings.b_lines.is_empty());
    assert_eq!(output.rankings.c_lines[0].tcc_id, "TCC_02");
    assert!(notes.iter().any(|n| n.contains("moved from B-line to C-line")));
}

#[test]
fn test_two_a_lines_are_rejected() {
    let a_line = r#"{"tcc_id": "TCC_01", "spine_score": 9.0,
        "reasoning": {"scene_count": 3, "setup_payoff_density": 0.5, "drives_climax": true},
        "forces": {"protagonist": "Ann", "primary_antagonist": "The forger"}}"#;
    let json = format!(r#"{{"rankings": {{"a_line": [{a_line}, {a_line}]}}}}"#);
    let err = Auditor::parse(&json, &discovered(), &script_with_one_issue(), 0.3).unwrap_err();
    assert_eq!(err, AttemptErrorKind::Schema(SchemaErrorKind::ALineCount(2)));
}

#[test]
fn test_free_text_change_type_maps_to_delete() {
    let script = consistent_script();
    let before: HashSet<IntegrityViolation> = integrity_violations(&script).into_iter().collect();
    assert!(before.is_empty());

    let json = r#"{"modification_log": [
        {"issue_id": "ISS_001", "applied": true, "scene_id": "S04",
         "field": "setup_payoff.payoff_from", "change_type": "remove the entry",
         "old_value": "S02", "new_value": null}
    ], "validation": {"total_issues": 1, "fixed": 1, "skipped": 0, "new_issues_introduced": 0}}"#;

    let output = Modifier::parse(json, &script, &before).unwrap();
    assert_eq!(
        output.modification_log[0].change_type,
        Some(ChangeType::Delete)
    );
    assert!(
        output
            .modified_script
            .scene("S04")
            .unwrap()
            .setup_payoff
            .payoff_from
            .is_empty()
    );
    // S02 still sets up S04, which no longer acknowledges it.
    assert_eq!(output.validation.new_issues_introduced, 1);
}

#[test]
fn test_modifier_rejects_unbalanced_summary() {
    let json = r#"{"modification_log": [],
        "validation": {"total_issues": 3, "fixed": 1, "skipped": 1}}"#;
    let err = Modifier::parse(json, &script_with_one_issue(), &HashSet::new()).unwrap_err();
    assert!(matches!(
        err,
        AttemptErrorKind::Schema(SchemaErrorKind::SummaryMismatch { total: 3, .. })
    ));
}

#[test]
fn test_modifier_rejects_edits_to_missing_scenes() {
    let json = r#"{"modification_log": [
        {"issue_id": "ISS_001", "applied": true, "scene_id": "S99",
         "field": "key_events", "change_type": "add", "new_value": "Ann leaves"}
    ], "validation": {"total_issues": 1, "fixed": 1, "skipped": 0}}"#;
    let err = Modifier::parse(json, &script_with_one_issue(), &HashSet::new()).unwrap_err();
    assert!(matches!(
        err,
        AttemptErrorKind::Schema(SchemaErrorKind::UnknownScene { .. })
    ));
}

#[test]
fn test_modifier_cannot_empty_a_scene() {
    let json = r#"{"modification_log": [
        {"issue_id": "ISS_001", "applied": true, "scene_id": "S02",
         "field": "key_events", "change_type": "delete", "old_value": "Ben hides the printing plate"}
    ], "validation": {"total_issues": 1, "fixed": 1, "skipped": 0}}"#;
    let err = Modifier::parse(json, &script_with_one_issue(), &HashSet::new()).unwrap_err();
    assert!(matches!(
        err,
        AttemptErrorKind::Schema(SchemaErrorKind::InvalidModifiedScript(_))
    ));
}
