//! Variant comparison and run history over scripted drivers.

mod test_utils;

use dramaturg_core::Stage;
use dramaturg_error::{ProviderError, ProviderErrorKind};
use dramaturg_interface::DramaturgDriver;
use dramaturg_models::Provider;
use dramaturg_pipeline::{
    DramaturgConfig, DriverFactory, InMemoryPromptLibrary, MetricsStore, PipelineVariant,
    RunRecord, VariantComparison,
};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    AUDITOR_REPLY, DISCOVERER_REPLY, MODIFIER_REPLY, MockDriver, pipeline, script_with_one_issue,
};

fn immediate_config() -> DramaturgConfig {
    let mut config = DramaturgConfig::default();
    config.retry = serde_json::from_value(serde_json::json!({
        "max_attempts": 3,
        "initial_backoff_ms": 0,
        "max_backoff_ms": 0
    }))
    .unwrap();
    config
}

#[tokio::test]
async fn test_comparison_picks_successful_variant() -> anyhow::Result<()> {
    let factory: DriverFactory = Arc::new(|variant: &PipelineVariant, _timeout: Duration| {
        let driver: Arc<dyn DramaturgDriver> = match variant.name().as_str() {
            "good" => Arc::new(MockDriver::with_texts([
                DISCOVERER_REPLY,
                AUDITOR_REPLY,
                MODIFIER_REPLY,
            ])),
            "no-key" => {
                return Err(ProviderError::new(ProviderErrorKind::MissingApiKey(
                    "OPENAI_API_KEY".to_string(),
                )));
            }
            _ => Arc::new(MockDriver::always("no json here")),
        };
        Ok(driver)
    });

    let comparison =
        VariantComparison::new(immediate_config(), Arc::new(InMemoryPromptLibrary::default()))
            .with_driver_factory(factory);
    let variants = [
        PipelineVariant::new("broken", Provider::DeepSeek),
        PipelineVariant::new("good", Provider::Anthropic),
        PipelineVariant::new("no-key", Provider::OpenAi),
    ];
    let report = comparison
        .compare(&script_with_one_issue(), "forgery.json", &variants)
        .await;

    assert_eq!(report.results.len(), 3);
    assert_eq!(report.winner.as_deref(), Some("good"));

    let broken = &report.results[0];
    assert!(!broken.success);
    assert_eq!(broken.metrics.stage(Stage::Discoverer).calls, 3);

    let good = &report.results[1];
    assert!(good.success);
    assert_eq!(good.tcc_count, 2);
    assert!((good.mean_confidence - 0.8).abs() < 1e-9);

    let no_key = &report.results[2];
    assert!(!no_key.success);
    assert!(no_key.errors[0].contains("OPENAI_API_KEY"));
    Ok(())
}

#[tokio::test]
async fn test_concurrent_runs_share_one_history() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(MetricsStore::new(dir.path().join("history.jsonl")));

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let driver = if i % 2 == 0 {
                MockDriver::with_texts([DISCOVERER_REPLY, AUDITOR_REPLY, MODIFIER_REPLY])
            } else {
                MockDriver::always("nothing useful")
            };
            let result = pipeline(Arc::new(driver))
                .run(script_with_one_issue())
                .await;
            let record = RunRecord::from_result(format!("script-{}.json", i), &result);
            store.append(&record).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let records = store.load_all().await?;
    assert_eq!(records.len(), 4);
    let successes = records.iter().filter(|r| r.success).count();
    assert_eq!(successes, 2);
    // One call per stage, or three failed discoverer attempts; never another run's calls.
    for record in &records {
        assert_eq!(record.metrics.total_calls(), 3);
    }

    let stats = store.stats(None).await?.unwrap();
    assert_eq!(stats.total_runs, 4);
    assert_eq!(stats.success_rate, 50.0);
    assert_eq!(stats.stage_stats[&Stage::Discoverer].avg_calls, 2.0);
    Ok(())
}
