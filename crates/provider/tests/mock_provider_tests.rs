//! Mock Provider Tests
//!
//! The backend traits must be mockable and usable as trait objects.

use async_trait::async_trait;
use mockall::mock;
use serde_json::json;
use std::sync::Arc;
use triage_provider::{
    ChatParams, ChatResponse, EmbeddingProvider, GenerationProvider, Message, Provider,
    ProviderError, Tool, ToolChoice,
};

mock! {
    pub Provider {}

    #[async_trait]
    impl Provider for Provider {
        async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;
        fn default_model(&self) -> String;
        fn is_configured(&self) -> bool;
    }
}

mock! {
    pub Embedder {}

    #[async_trait]
    impl EmbeddingProvider for Embedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
    }
}

mock! {
    pub Generator {}

    #[async_trait]
    impl GenerationProvider for Generator {
        async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ProviderError>;
    }
}

#[tokio::test]
async fn test_mock_chat_with_tool_call() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .withf(|params| params.tools.len() == 1 && params.messages[0].role == "user")
        .returning(|_| Ok(ChatResponse::with_tool_call("open_ticket", json!({"severity": "HIGH"}))));

    let params = ChatParams {
        model: "functiongemma".to_string(),
        messages: vec![Message::user("Open a ticket")],
        tools: vec![Tool::new("open_ticket", "Open a ticket", json!({}))],
        tool_choice: ToolChoice::Auto,
        ..Default::default()
    };

    let response = mock.chat(params).await.unwrap();
    assert!(response.has_tool_calls());
    assert_eq!(response.tool_calls[0].name, "open_ticket");
}

#[tokio::test]
async fn test_mock_chat_rate_limited() {
    let mut mock = MockProvider::new();

    mock.expect_chat()
        .times(1)
        .returning(|_| Err(ProviderError::RateLimited));

    let result = mock.chat(ChatParams::default()).await;
    assert!(matches!(result, Err(ProviderError::RateLimited)));
}

#[test]
fn test_mock_provider_metadata() {
    let mut mock = MockProvider::new();

    mock.expect_default_model()
        .returning(|| "functiongemma".to_string());
    mock.expect_is_configured().returning(|| true);

    assert_eq!(mock.default_model(), "functiongemma");
    assert!(mock.is_configured());
}

#[tokio::test]
async fn test_mock_embedder_as_trait_object() {
    let mut mock = MockEmbedder::new();

    mock.expect_embed()
        .times(2)
        .returning(|text| Ok(vec![text.len() as f32, 1.0]));

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(mock);

    assert_eq!(embedder.embed("abc").await.unwrap(), vec![3.0, 1.0]);
    assert_eq!(embedder.embed("").await.unwrap(), vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_mock_generator_receives_temperature() {
    let mut mock = MockGenerator::new();

    mock.expect_generate()
        .times(1)
        .withf(|prompt, temperature| prompt.contains("Alert") && *temperature == 0.0)
        .returning(|_, _| Ok("[]".to_string()));

    let generator: Box<dyn GenerationProvider> = Box::new(mock);
    let output = generator.generate("Alert: disk full", 0.0).await.unwrap();

    assert_eq!(output, "[]");
}

#[tokio::test]
async fn test_mock_generator_error_propagates() {
    let mut mock = MockGenerator::new();

    mock.expect_generate()
        .returning(|_, _| Err(ProviderError::Api("model not loaded".to_string())));

    match mock.generate("x", 0.0).await {
        Err(ProviderError::Api(msg)) => assert_eq!(msg, "model not loaded"),
        other => panic!("Expected Api error, got {:?}", other),
    }
}
