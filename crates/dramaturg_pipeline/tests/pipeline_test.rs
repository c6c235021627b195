//! End-to-end pipeline runs against a scripted driver.

mod test_utils;

use dramaturg_core::{Scene, Script, Stage};
use dramaturg_error::{
    AttemptErrorKind, ProviderErrorKind, SanitizeErrorKind, SchemaErrorKind, ScriptErrorKind,
    StageErrorKind,
};
use dramaturg_pipeline::{INPUT_STAGE, PipelineStage};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{
    AUDITOR_REPLY, DISCOVERER_REPLY, MODIFIER_REPLY, MockDriver, MockReply, consistent_script,
    fast_settings, pipeline, script_with_one_issue, single_scene_script,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_full_run_produces_every_output() {
    let driver = Arc::new(MockDriver::with_texts([
        DISCOVERER_REPLY,
        AUDITOR_REPLY,
        MODIFIER_REPLY,
    ]));
    let result = pipeline(driver.clone()).run(script_with_one_issue()).await;

    assert!(result.is_success(), "errors: {:?}", result.state.errors);
    assert!(result.state.is_complete());
    assert_eq!(result.state.current_stage, PipelineStage::Completed);
    assert_eq!(driver.call_count(), 3);

    let discovered = result.state.discoverer_output.as_ref().unwrap();
    assert_eq!(discovered.tccs.len(), 2);
    assert_eq!(discovered.metadata.total_scenes_analyzed, 4);

    let audited = result.state.auditor_output.as_ref().unwrap();
    assert_eq!(audited.rankings.a_line.tcc_id, "TCC_01");
    assert_eq!(audited.rankings.b_lines.len(), 1);
    assert_eq!(
        audited.rankings.a_line.forces.dynamic_antagonist,
        Some(vec!["Ben".to_string()])
    );

    let modified = result.state.modifier_output.as_ref().unwrap();
    assert_eq!(modified.modification_log[0].issue_id, "ISS_001");
    assert_eq!(modified.validation.new_issues_introduced, 0);
    let s03 = modified.modified_script.scene("S03").unwrap();
    assert_eq!(s03.setup_payoff.payoff_from, vec!["S01".to_string()]);

    // The input script is never edited in place.
    let original = result.state.script.scene("S03").unwrap();
    assert!(original.setup_payoff.payoff_from.is_empty());

    assert_eq!(result.metrics.total_calls(), 3);
    assert_eq!(result.metrics.total_retries(), 0);
    assert_eq!(result.metrics.total_tokens(), 450);
    assert_eq!(result.state.trace.len(), 9);
}

#[tokio::test]
async fn test_consistent_script_skips_modifier_call() {
    let driver = Arc::new(MockDriver::with_texts([DISCOVERER_REPLY, AUDITOR_REPLY]));
    let result = pipeline(driver.clone()).run(consistent_script()).await;

    assert!(result.is_success());
    assert_eq!(driver.call_count(), 2);
    let modified = result.state.modifier_output.unwrap();
    assert!(modified.modification_log.is_empty());
    assert_eq!(modified.validation.total_issues, 0);
    assert_eq!(modified.modified_script, result.state.script);
}

#[tokio::test]
async fn test_invalid_script_fails_before_any_call() {
    let duplicate = Scene::builder()
        .scene_id("S01")
        .key_events(vec!["Ann arrives".to_string()])
        .build()
        .unwrap();
    let script = Script::new(vec![duplicate.clone(), duplicate]);

    let driver = Arc::new(MockDriver::always(DISCOVERER_REPLY));
    let result = pipeline(driver.clone()).run(script).await;

    assert_eq!(driver.call_count(), 0);
    assert_eq!(result.state.current_stage, PipelineStage::Failed);
    let failure = result.failure.unwrap();
    assert_eq!(failure.stage, INPUT_STAGE);
    assert_eq!(
        failure.kind,
        StageErrorKind::InvalidScript(ScriptErrorKind::DuplicateSceneId("S01".to_string()))
    );
    assert!(result.state.discoverer_output.is_none());
}

#[tokio::test]
async fn test_single_scene_evidence_exhausts_retries() {
    let reply = r#"{"tccs": [{"tcc_id": "TCC_01", "super_objective": "Ann must expose the forger",
        "core_conflict_type": "interpersonal", "evidence_scenes": ["S01"], "confidence": 0.8}]}"#;
    let driver = Arc::new(MockDriver::always(reply));
    let result = pipeline(driver.clone()).run(single_scene_script()).await;

    assert_eq!(driver.call_count(), 3);
    let failure = result.failure.unwrap();
    assert_eq!(failure.stage, "discoverer");
    assert_eq!(failure.attempts, 3);
    assert!(matches!(
        failure.kind,
        StageErrorKind::Exhausted(AttemptErrorKind::Schema(
            SchemaErrorKind::InsufficientEvidence { count: 1, .. }
        ))
    ));
    assert_eq!(result.state.retry_counts[&Stage::Discoverer], 3);
    assert_eq!(result.metrics.stage(Stage::Discoverer).validation_errors, 3);
}

#[tokio::test]
async fn test_unparseable_replies_stop_at_retry_budget() {
    let driver = Arc::new(MockDriver::always("I'm sorry, I can't produce JSON today."));
    let result = pipeline(driver.clone()).run(script_with_one_issue()).await;

    assert_eq!(driver.call_count(), 3);
    assert!(matches!(
        result.failure.unwrap().kind,
        StageErrorKind::Exhausted(AttemptErrorKind::Sanitize(SanitizeErrorKind::NoJsonObject(_)))
    ));
    assert_eq!(result.state.current_stage, PipelineStage::Failed);
}

#[tokio::test]
async fn test_auditor_failure_keeps_discoverer_output() {
    let driver = Arc::new(MockDriver::with_texts([
        DISCOVERER_REPLY,
        r#"{"rankings": {"a_line": [], "b_lines": []}}"#,
    ]));
    let result = pipeline(driver.clone()).run(script_with_one_issue()).await;

    assert_eq!(driver.call_count(), 4);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.stage, "auditor");
    assert!(matches!(
        failure.kind,
        StageErrorKind::Exhausted(AttemptErrorKind::Schema(SchemaErrorKind::ALineCount(0)))
    ));
    assert!(result.state.discoverer_output.is_some());
    assert!(result.state.auditor_output.is_none());
    assert!(result.state.modifier_output.is_none());
    assert!(!result.state.is_complete());
    assert!(!result.is_success());
    assert_eq!(result.state.current_stage, PipelineStage::Failed);
    assert!(result.state.errors[0].contains("auditor failed after 3 attempts"));
}

#[tokio::test]
async fn test_retry_carries_rejection_reason() {
    let driver = Arc::new(MockDriver::with_texts([
        "{\"tccs\": [",
        DISCOVERER_REPLY,
        AUDITOR_REPLY,
        MODIFIER_REPLY,
    ]));
    let result = pipeline(driver.clone()).run(script_with_one_issue()).await;

    assert!(result.is_success());
    assert_eq!(result.state.retry_counts[&Stage::Discoverer], 1);
    assert_eq!(result.metrics.stage(Stage::Discoverer).calls, 2);

    let requests = driver.requests();
    let first = &requests[0].messages[1].content;
    let retry = &requests[1].messages[1].content;
    assert!(!first.contains("previous response was rejected"));
    assert!(retry.contains("Your previous response was rejected"));
    assert!(retry.starts_with("Analyze this script:"));
}

#[tokio::test]
async fn test_model_refusal_is_not_retried() {
    let driver = Arc::new(MockDriver::always(
        r#"{"tccs": [], "metadata": {"error": "No conflict found"}}"#,
    ));
    let result = pipeline(driver.clone()).run(script_with_one_issue()).await;

    assert_eq!(driver.call_count(), 1);
    assert_eq!(
        result.failure.unwrap().kind,
        StageErrorKind::Permanent(AttemptErrorKind::Rejected("No conflict found".to_string()))
    );
}

#[tokio::test]
async fn test_provider_errors_follow_status_classification() {
    let unauthorized = Arc::new(MockDriver::new(vec![MockReply::Error(
        ProviderErrorKind::HttpStatus {
            status_code: 401,
            message: "invalid key".to_string(),
        },
    )]));
    let result = pipeline(unauthorized.clone())
        .run(script_with_one_issue())
        .await;
    assert_eq!(unauthorized.call_count(), 1);
    assert!(matches!(
        result.failure.unwrap().kind,
        StageErrorKind::Permanent(AttemptErrorKind::Provider(ProviderErrorKind::HttpStatus {
            status_code: 401,
            ..
        }))
    ));

    let overloaded = Arc::new(MockDriver::new(vec![
        MockReply::Error(ProviderErrorKind::HttpStatus {
            status_code: 503,
            message: "overloaded".to_string(),
        }),
        MockReply::Text(DISCOVERER_REPLY.to_string()),
        MockReply::Text(AUDITOR_REPLY.to_string()),
        MockReply::Text(MODIFIER_REPLY.to_string()),
    ]));
    let result = pipeline(overloaded.clone())
        .run(script_with_one_issue())
        .await;
    assert!(result.is_success());
    assert_eq!(overloaded.call_count(), 4);
    assert_eq!(result.metrics.stage(Stage::Discoverer).retries, 1);
    assert_eq!(result.metrics.stage(Stage::Discoverer).validation_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_reply_times_out_and_retries() {
    let driver = Arc::new(MockDriver::new(vec![
        MockReply::Delayed(Duration::from_secs(30), DISCOVERER_REPLY.to_string()),
        MockReply::Text(DISCOVERER_REPLY.to_string()),
        MockReply::Text(AUDITOR_REPLY.to_string()),
        MockReply::Text(MODIFIER_REPLY.to_string()),
    ]));
    let pipeline = dramaturg_pipeline::Pipeline::new(
        driver.clone(),
        Arc::new(dramaturg_pipeline::InMemoryPromptLibrary::default()),
        fast_settings().with_request_timeout(Duration::from_secs(5)),
    );
    let result = pipeline.run(script_with_one_issue()).await;

    assert!(result.is_success());
    assert_eq!(driver.call_count(), 4);
    assert_eq!(result.state.retry_counts[&Stage::Discoverer], 1);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let driver = Arc::new(MockDriver::always(DISCOVERER_REPLY));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline(driver.clone())
        .run_with_cancel(script_with_one_issue(), cancel)
        .await;

    assert_eq!(driver.call_count(), 0);
    assert_eq!(result.state.current_stage, PipelineStage::Failed);
    assert_eq!(result.failure.unwrap().kind, StageErrorKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_in_flight_call() {
    let driver = Arc::new(MockDriver::new(vec![MockReply::Delayed(
        Duration::from_secs(60),
        DISCOVERER_REPLY.to_string(),
    )]));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = pipeline(driver.clone())
        .run_with_cancel(script_with_one_issue(), cancel)
        .await;

    let failure = result.failure.unwrap();
    assert_eq!(failure.kind, StageErrorKind::Cancelled);
    assert_eq!(failure.stage, "discoverer");
    assert!(result.state.discoverer_output.is_none());
}

#[tokio::test]
async fn test_single_stage_entry_points() {
    let driver = Arc::new(MockDriver::with_texts([
        "no json here",
        DISCOVERER_REPLY,
        AUDITOR_REPLY,
    ]));
    let pipeline = pipeline(driver.clone());
    let script = script_with_one_issue();

    let discovered = pipeline.discover(&script).await.unwrap();
    assert_eq!(discovered.run.output.tccs.len(), 2);
    assert_eq!(discovered.run.attempts, 2);
    assert_eq!(discovered.run.trace.len(), 3);
    assert_eq!(discovered.metrics.total_calls(), 2);
    assert_eq!(discovered.metrics.total_retries(), 1);
    assert_eq!(discovered.metrics.stage(Stage::Auditor).calls, 0);

    let audited = pipeline.audit(&script, &discovered.run.output).await.unwrap();
    let output = &audited.run.output;
    assert_eq!(output.metrics.total_scenes, 4);
    assert_eq!(output.metrics.a_line_coverage, 0.75);
    // 3 scenes * 2 + density * 1.5 + 2 for driving the climax
    assert!(output.rankings.a_line.spine_score >= 8.0);
    assert_eq!(audited.run.attempts, 1);
    // Each single-stage run counts only its own calls.
    assert_eq!(audited.metrics.total_calls(), 1);
    assert_eq!(audited.metrics.stage(Stage::Discoverer).calls, 0);
    assert_eq!(driver.call_count(), 3);
}
