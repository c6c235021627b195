//! Tests through the re-exporting facade crate.

use dramaturg::{
    DramaturgConfig, MetricsStore, Pipeline, Script, ScriptErrorKind,
    validate_setup_payoff_integrity,
};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn forgery() -> Script {
    let text = std::fs::read_to_string(fixture("forgery.json")).unwrap();
    Script::from_json(&text).unwrap()
}

#[test]
fn test_fixture_is_valid_with_one_broken_link() {
    let script = forgery();
    script.validate().unwrap();
    assert_eq!(script.len(), 4);
    assert_eq!(script.missing_setup_payoff_ratio(), 0.25);

    let issues = validate_setup_payoff_integrity(&script);
    assert_eq!(issues.len(), 1);
    assert!(issues[0].contains("S01"));
    assert!(issues[0].contains("S03"));
}

#[test]
fn test_scene_without_events_is_rejected() {
    let mut script = forgery();
    script.scenes[1].key_events.clear();
    let err = script.validate().unwrap_err();
    assert!(matches!(
        err.kind,
        ScriptErrorKind::KeyEventCount { count: 0, .. }
    ));
}

#[tokio::test]
async fn test_empty_history_has_no_stats() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = MetricsStore::new(dir.path().join("history.jsonl"));
    assert!(store.load_all().await?.is_empty());
    assert!(store.stats(Some(10)).await?.is_none());
    Ok(())
}

/// Full run against the configured provider.
#[tokio::test]
#[cfg_attr(not(feature = "api"), ignore)] // Requires a provider API key
async fn test_live_pipeline_on_fixture() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = DramaturgConfig::load()?;
    let pipeline = Pipeline::from_config(&config)?;

    let result = pipeline.run(forgery()).await;
    assert!(result.is_success(), "{:?}", result.state.errors);
    let discovered = result.state.discoverer_output.as_ref().unwrap();
    assert!(!discovered.tccs.is_empty());
    assert!(result.metrics.total_calls() >= 3);
    Ok(())
}
