//! Configuration file loading.

use dramaturg_core::Stage;
use dramaturg_interface::PromptLibrary;
use dramaturg_models::Provider;
use dramaturg_pipeline::DramaturgConfig;
use std::io::Write;
use std::time::Duration;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config(
        r#"
[llm]
provider = "anthropic"
model = "claude-sonnet-4-5"

[thresholds]
b_line_interaction = 0.4
"#,
    );
    let config = DramaturgConfig::from_file(file.path()).unwrap();

    assert_eq!(*config.llm.provider(), Provider::Anthropic);
    assert_eq!(config.llm.model().as_deref(), Some("claude-sonnet-4-5"));
    assert_eq!(*config.llm.max_tokens(), 4096);
    assert_eq!(*config.retry.max_attempts(), 3);
    assert_eq!(*config.thresholds.b_line_interaction(), 0.4);
    assert_eq!(*config.thresholds.mirror_overlap(), 0.7);

    let settings = config.stage_settings();
    assert_eq!(settings.model().as_deref(), Some("claude-sonnet-4-5"));
    assert_eq!(*settings.request_timeout(), Duration::from_secs(120));
}

#[test]
fn test_out_of_range_threshold_is_rejected() {
    let file = write_config("[thresholds]\nmirror_overlap = 1.5\n");
    let err = DramaturgConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("mirror_overlap"));
}

#[test]
fn test_backoff_schedule_follows_retry_section() {
    let file = write_config("[retry]\nmax_attempts = 4\ninitial_backoff_ms = 1000\nmax_backoff_ms = 3000\n");
    let config = DramaturgConfig::from_file(file.path()).unwrap();
    let policy = config.retry.policy();
    assert_eq!(*policy.max_attempts(), 4);
    assert_eq!(policy.delay_before(2), Duration::from_millis(1000));
    assert_eq!(policy.delay_before(3), Duration::from_millis(2000));
    assert_eq!(policy.delay_before(4), Duration::from_millis(3000));
}

#[test]
fn test_prompt_directory_overrides_builtins() {
    let dir = tempfile::tempdir().unwrap();
    for stage in [Stage::Discoverer, Stage::Auditor, Stage::Modifier] {
        std::fs::write(
            dir.path().join(format!("{}.md", stage.prompt_name())),
            format!("custom {}", stage),
        )
        .unwrap();
    }
    let file = write_config(&format!(
        "[prompts]\ndir = {:?}\n",
        dir.path().display().to_string()
    ));
    let config = DramaturgConfig::from_file(file.path()).unwrap();
    let prompts = config.prompt_library().unwrap();
    assert_eq!(prompts.prompt(Stage::Auditor), "custom auditor");
}
