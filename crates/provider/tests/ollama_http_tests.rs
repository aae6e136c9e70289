//! HTTP-level tests for the Ollama node against a mock server

use mockito::Matcher;
use serde_json::json;
use triage_provider::{
    ChatParams, EmbeddingProvider, GenerationProvider, Message, OllamaProvider, Provider,
    ProviderError, Tool,
};

#[tokio::test]
async fn test_embed_parses_vector() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/embeddings")
        .match_body(Matcher::PartialJson(
            json!({"model": "all-minilm", "prompt": "System incident or outage"}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"embedding": [0.5, -0.25, 1.0]}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "all-minilm");
    let embedding = provider.embed("System incident or outage").await.unwrap();

    assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_embed_missing_field_is_invalid() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/embeddings")
        .with_status(200)
        .with_body(r#"{"embeddings": []}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "all-minilm");
    let result = provider.embed("x").await;

    assert!(matches!(result, Err(ProviderError::InvalidResponse)));
}

#[tokio::test]
async fn test_generate_sends_temperature() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "phi3:mini",
            "stream": false,
            "options": {"temperature": 0.0}
        })))
        .with_status(200)
        .with_body(r#"{"response": "```json\n[]\n```", "done": true}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "phi3:mini");
    let output = provider.generate("plan this", 0.0).await.unwrap();

    assert_eq!(output, "```json\n[]\n```");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_api_error_message_surfaces() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/generate")
        .with_status(404)
        .with_body(r#"{"error": "model 'phi3:mini' not found"}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "phi3:mini");

    match provider.generate("x", 0.0).await {
        Err(ProviderError::Api(msg)) => assert!(msg.contains("not found")),
        other => panic!("Expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(429)
        .with_body("slow down")
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "functiongemma");
    let result = provider.chat(ChatParams::default()).await;

    assert!(matches!(result, Err(ProviderError::RateLimited)));
}

#[tokio::test]
async fn test_chat_returns_tool_call() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({"model": "functiongemma"})))
        .with_status(200)
        .with_body(
            json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "restart_service", "arguments": {"service": "master", "env": "production"}}}
                    ]
                },
                "done_reason": "stop"
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "functiongemma");
    let params = ChatParams {
        messages: vec![Message::user("Restart master in production")],
        tools: vec![Tool::new("restart_service", "Restart a service", json!({}))],
        ..Default::default()
    };

    let response = provider.chat(params).await.unwrap();

    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "restart_service");
    assert_eq!(response.tool_calls[0].arguments["env"], "production");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_backend_is_request_error() {
    // Port 9 (discard) is not an HTTP server
    let provider = OllamaProvider::new("http://127.0.0.1:9", "all-minilm");
    let result = provider.embed("x").await;

    assert!(matches!(result, Err(ProviderError::Request(_))));
}
