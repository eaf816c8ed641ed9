// tests/ai_adapter_stub.rs
use news_digest::ai_adapter::{build_client_from_config, DisabledClient, ModelClient, ModelError};
use news_digest::analyze::build_prompt;
use news_digest::config::ModelConfig;
use news_digest::Article;
use serial_test::serial;
use tokio::runtime::Runtime;

fn prompt() -> news_digest::analyze::Prompt {
    let a = Article::new("https://a.test/1", "Oil slides", "crude fell", "Wire", chrono::Utc::now());
    build_prompt(&[a], &[], 30, 800)
}

#[test]
fn disabled_client_reports_disabled() {
    let rt = Runtime::new().unwrap();
    rt.block_on(async {
        let err = DisabledClient.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, ModelError::Disabled));
        assert!(!err.is_transient());
    });
}

#[test]
#[serial]
fn default_config_builds_disabled_client() {
    std::env::remove_var("AI_TEST_MODE");
    let client = build_client_from_config(&ModelConfig::default());
    assert_eq!(client.provider_name(), "disabled");
}

#[test]
#[serial]
fn enabled_openai_without_key_falls_back_to_disabled() {
    std::env::remove_var("AI_TEST_MODE");
    let cfg = ModelConfig {
        enabled: true,
        ..ModelConfig::default()
    };
    assert_eq!(build_client_from_config(&cfg).provider_name(), "disabled");
}

#[test]
#[serial]
fn enabled_openai_with_key_is_wrapped_provider() {
    std::env::remove_var("AI_TEST_MODE");
    let cfg = ModelConfig {
        enabled: true,
        api_key: "sk-test".into(),
        ..ModelConfig::default()
    };
    assert_eq!(build_client_from_config(&cfg).provider_name(), "openai");
}

#[tokio::test]
#[serial]
async fn test_mode_env_forces_mock() {
    std::env::set_var("AI_TEST_MODE", "mock");
    let client = build_client_from_config(&ModelConfig::default());
    assert_eq!(client.provider_name(), "mock");
    let text = client.complete(&prompt()).await.unwrap();
    assert!(text.contains("marketOverview"));
    std::env::remove_var("AI_TEST_MODE");
}
