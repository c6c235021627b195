//! Live provider tests. Run with `cargo test -p dramaturg_models --features api -- --ignored`.

#![cfg(feature = "api")]

use dramaturg_core::{GenerateRequest, Message};
use dramaturg_models::{Provider, create_driver};
use std::time::Duration;

#[tokio::test]
#[ignore]
async fn deepseek_returns_text() {
    let _ = dotenvy::dotenv();
    let driver = create_driver(Provider::DeepSeek, None, Duration::from_secs(60))
        .expect("DEEPSEEK_API_KEY must be set");

    let request = GenerateRequest {
        messages: vec![Message::user("Reply with the JSON object {\"ok\": true} and nothing else.")],
        max_tokens: Some(32),
        temperature: Some(0.0),
        model: None,
    };
    let response = driver.generate(&request).await.expect("request failed");
    assert!(response.text.contains("ok"));
    assert_eq!(driver.provider_name(), "deepseek");
}

#[tokio::test]
#[ignore]
async fn anthropic_returns_text() {
    let _ = dotenvy::dotenv();
    let driver = create_driver(Provider::Anthropic, None, Duration::from_secs(60))
        .expect("ANTHROPIC_API_KEY must be set");

    let request = GenerateRequest {
        messages: vec![
            Message::system("Answer in JSON."),
            Message::user("Reply with {\"ok\": true}."),
        ],
        max_tokens: Some(32),
        ..Default::default()
    };
    let response = driver.generate(&request).await.expect("request failed");
    assert!(!response.text.is_empty());
}
