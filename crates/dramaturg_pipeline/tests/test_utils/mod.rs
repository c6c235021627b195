//! Test utilities for pipeline tests.
//!
//! Provides a scripted driver plus scripts and model replies that satisfy
//! every stage's rules.

#![allow(dead_code)]

use dramaturg_core::{Scene, Script, SetupPayoff};
use dramaturg_pipeline::{InMemoryPromptLibrary, Pipeline, RetryPolicy, StageSettings};
use std::sync::Arc;

pub mod mock_driver;

#[allow(unused_imports)]
pub use mock_driver::{MockDriver, MockReply};

fn scene(id: &str, event: &str, setup_for: &[&str], payoff_from: &[&str]) -> Scene {
    Scene::builder()
        .scene_id(id)
        .setting("Print shop, night")
        .characters(vec!["Ann".to_string(), "Ben".to_string()])
        .key_events(vec![event.to_string()])
        .setup_payoff(SetupPayoff {
            setup_for: setup_for.iter().map(|s| s.to_string()).collect(),
            payoff_from: payoff_from.iter().map(|s| s.to_string()).collect(),
        })
        .build()
        .expect("valid scene")
}

/// Four scenes where S01 sets up S03 but S03 does not list S01 as its source.
pub fn script_with_one_issue() -> Script {
    Script::new(vec![
        scene("S01", "Ann finds a forged ledger", &["S03"], &[]),
        scene("S02", "Ben hides the printing plate", &["S04"], &[]),
        scene("S03", "Ann confronts the forger", &[], &[]),
        scene("S04", "Ben returns the plate", &[], &["S02"]),
    ])
}

/// The same story with every link reciprocal.
pub fn consistent_script() -> Script {
    Script::new(vec![
        scene("S01", "Ann finds a forged ledger", &["S03"], &[]),
        scene("S02", "Ben hides the printing plate", &["S04"], &[]),
        scene("S03", "Ann confronts the forger", &[], &["S01"]),
        scene("S04", "Ben returns the plate", &[], &["S02"]),
    ])
}

pub fn single_scene_script() -> Script {
    Script::new(vec![scene("S01", "Ann finds a forged ledger", &[], &[])])
}

pub const DISCOVERER_REPLY: &str = r#"Here is the analysis:
{"tccs": [
  {"tcc_id": "TCC_01", "super_objective": "Ann must expose the forger",
   "core_conflict_type": "interpersonal", "evidence_scenes": ["S01", "S02", "S03"], "confidence": 0.9},
  {"tcc_id": "TCC_02", "super_objective": "Ben wants to win back trust",
   "core_conflict_type": "internal", "evidence_scenes": ["S03", "S04"], "confidence": 0.7}
], "metadata": {"total_scenes_analyzed": 4, "fallback_mode": false}}"#;

pub const AUDITOR_REPLY: &str = r#"```json
{"rankings": {
  "a_line": {"tcc_id": "TCC_01", "spine_score": 1.0,
    "reasoning": {"scene_count": 3, "setup_payoff_density": 0.5, "drives_climax": true},
    "forces": {"protagonist": "Ann", "primary_antagonist": "The forger", "dynamic_antagonist": "Ben"}},
  "b_lines": [{"tcc_id": "TCC_02", "heart_score": 2.0,
    "reasoning": {"relation_change_count": 1, "a_line_interaction": 0.5, "theme_depth": 0.6},
    "forces": {"protagonist": "Ben", "primary_antagonist": "Ben's pride"}}],
  "c_lines": []
}}
```"#;

pub const MODIFIER_REPLY: &str = r#"{"modification_log": [
  {"issue_id": "ISS_001_fixed", "applied": true, "scene_id": "S03",
   "field": "setup_payoff.payoff_from", "change_type": "add",
   "old_value": null, "new_value": "S01", "reason": "Make the payoff reciprocal"}
], "validation": {"total_issues": 1, "fixed": 1, "skipped": 0, "new_issues_introduced": 0}}"#;

/// Settings that retry without waiting.
pub fn fast_settings() -> StageSettings {
    StageSettings::default().with_retry(RetryPolicy::immediate(3))
}

pub fn pipeline(driver: Arc<MockDriver>) -> Pipeline {
    Pipeline::new(
        driver,
        Arc::new(InMemoryPromptLibrary::default()),
        fast_settings(),
    )
}
