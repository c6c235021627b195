use dramaturg_core::{DiscovererOutput, Scene, Script};
use dramaturg_error::SchemaErrorKind;

fn script(ids: &[&str]) -> Script {
    Script::new(
        ids.iter()
            .map(|id| {
                Scene::builder()
                    .scene_id(*id)
                    .setting("Mill")
                    .key_events(vec!["the wheel turns".to_string()])
                    .build()
                    .unwrap()
            })
            .collect(),
    )
}

fn output(json: &str) -> DiscovererOutput {
    serde_json::from_str(json).unwrap()
}

#[test]
fn valid_output_passes() {
    let out = output(
        r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Nell wants to save the mill",
            "core_conflict_type": "interpersonal", "evidence_scenes": ["S01", "S02"], "confidence": 0.8}],
            "metadata": {"total_scenes_analyzed": 2, "primary_evidence_available": true, "fallback_mode": false}}"#,
    );
    assert!(out.validate(&script(&["S01", "S02"])).is_ok());
    assert_eq!(out.mean_confidence(), 0.8);
}

#[test]
fn single_evidence_scene_is_a_violation() {
    let out = output(
        r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Nell wants to save the mill",
            "core_conflict_type": "internal", "evidence_scenes": ["S01"], "confidence": 0.8}]}"#,
    );
    let err = out.validate(&script(&["S01"])).unwrap_err();
    assert!(matches!(err.kind, SchemaErrorKind::InsufficientEvidence { count: 1, .. }));
}

#[test]
fn unknown_evidence_scene_is_a_violation() {
    let out = output(
        r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Nell wants to save the mill",
            "core_conflict_type": "internal", "evidence_scenes": ["S01", "S07"], "confidence": 0.8}]}"#,
    );
    let err = out.validate(&script(&["S01", "S02"])).unwrap_err();
    assert!(matches!(err.kind, SchemaErrorKind::UnknownScene { .. }));
}

#[test]
fn bad_ids_and_ranges_are_violations() {
    let s = script(&["S01", "S02"]);
    let bad_id = output(
        r#"{"tccs": [{"tcc_id": "TCC_1", "super_objective": "Nell wants to save the mill",
            "core_conflict_type": "internal", "evidence_scenes": ["S01", "S02"], "confidence": 0.8}]}"#,
    );
    assert!(matches!(
        bad_id.validate(&s).unwrap_err().kind,
        SchemaErrorKind::InvalidTccId(_)
    ));

    let bad_confidence = output(
        r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Nell wants to save the mill",
            "core_conflict_type": "internal", "evidence_scenes": ["S01", "S02"], "confidence": 1.2}]}"#,
    );
    assert!(matches!(
        bad_confidence.validate(&s).unwrap_err().kind,
        SchemaErrorKind::ConfidenceOutOfRange { .. }
    ));

    let duplicate = output(
        r#"{"tccs": [
            {"tcc_id": "TCC_01", "super_objective": "Nell wants to save the mill",
             "core_conflict_type": "internal", "evidence_scenes": ["S01", "S02"], "confidence": 0.8},
            {"tcc_id": "TCC_01", "super_objective": "Nell wants to sell the mill",
             "core_conflict_type": "internal", "evidence_scenes": ["S01", "S02"], "confidence": 0.7}]}"#,
    );
    assert!(matches!(
        duplicate.validate(&s).unwrap_err().kind,
        SchemaErrorKind::DuplicateTccId(_)
    ));
}

#[test]
fn empty_output_needs_an_explanation() {
    let s = script(&["S01"]);
    assert!(matches!(
        output(r#"{"tccs": []}"#).validate(&s).unwrap_err().kind,
        SchemaErrorKind::EmptyWithoutError
    ));
    assert!(
        output(r#"{"tccs": [], "metadata": {"error": "no conflict found"}}"#)
            .validate(&s)
            .is_ok()
    );
}
