//! Hosted model provider against a mock chat-completions endpoint

use agentpair::auth::BearerTokenCache;
use agentpair::llm::{
    CompletionRequest, FinishReason, FoundryAuth, FoundryConfig, FoundryProvider, LlmError,
    LlmProvider, Message,
};
use agentpair::testing::mocks::MockCredential;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEPLOYMENT_PATH: &str = "/openai/deployments/gpt-4o-mini/chat/completions";

fn config(server: &MockServer) -> FoundryConfig {
    FoundryConfig {
        endpoint: format!("{}/", server.uri()),
        deployment: "gpt-4o-mini".to_string(),
        api_version: "2024-10-21".to_string(),
        timeout: Duration::from_secs(5),
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            Message::system("You are a helpful writer."),
            Message::user("Topic: Rust"),
        ],
        model: "gpt-4o-mini".to_string(),
        max_tokens: Some(400),
        temperature: Some(0.25),
        metadata: HashMap::new(),
    }
}

fn completion(text: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-mini-2024-07-18",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28}
    })
}

#[tokio::test]
async fn test_api_key_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(query_param("api-version", "2024-10-21"))
        .and(header("api-key", "test-key"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "system", "content": "You are a helpful writer."},
                {"role": "user", "content": "Topic: Rust"}
            ],
            "max_tokens": 400
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("A summary.")))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        FoundryProvider::new(config(&server), FoundryAuth::ApiKey("test-key".to_string()))
            .unwrap();
    let response = provider.complete(request()).await.unwrap();

    assert_eq!(response.text(), "A summary.");
    assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.total_tokens, 28);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(header("Authorization", "Bearer mock-token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(2)
        .mount(&server)
        .await;

    let credential = Arc::new(MockCredential::new(chrono::Duration::minutes(30)));
    let cache = Arc::new(BearerTokenCache::new(
        credential.clone(),
        "https://cognitiveservices.azure.com/.default",
    ));
    let provider = FoundryProvider::new(config(&server), FoundryAuth::Bearer(cache)).unwrap();

    provider.complete(request()).await.unwrap();
    provider.complete(request()).await.unwrap();
    assert_eq!(credential.fetch_count(), 1);
}

#[tokio::test]
async fn test_unauthorized_invalidates_cached_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(header("Authorization", "Bearer mock-token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .and(header("Authorization", "Bearer mock-token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("fresh")))
        .mount(&server)
        .await;

    let credential = Arc::new(MockCredential::new(chrono::Duration::minutes(30)));
    let cache = Arc::new(BearerTokenCache::new(credential.clone(), "scope/.default"));
    let provider = FoundryProvider::new(config(&server), FoundryAuth::Bearer(cache)).unwrap();

    let first = provider.complete(request()).await;
    assert!(matches!(first, Err(LlmError::AuthenticationFailed(_))));

    let second = provider.complete(request()).await.unwrap();
    assert_eq!(second.text(), "fresh");
    assert_eq!(credential.fetch_count(), 2);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("third time")))
        .mount(&server)
        .await;

    let provider =
        FoundryProvider::new(config(&server), FoundryAuth::ApiKey("k".to_string())).unwrap();
    let response = provider.complete(request()).await.unwrap();
    assert_eq!(response.text(), "third time");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        FoundryProvider::new(config(&server), FoundryAuth::ApiKey("k".to_string())).unwrap();
    let result = provider.complete(request()).await;

    match result {
        Err(LlmError::ApiError(message)) => assert!(message.contains("bad request")),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider =
        FoundryProvider::new(config(&server), FoundryAuth::ApiKey("k".to_string())).unwrap();
    let result = provider.complete(request()).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_missing_content_is_empty_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(DEPLOYMENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant"}, "finish_reason": "content_filter"}]
        })))
        .mount(&server)
        .await;

    let provider =
        FoundryProvider::new(config(&server), FoundryAuth::ApiKey("k".to_string())).unwrap();
    let response = provider.complete(request()).await.unwrap();

    assert_eq!(response.text(), "");
    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(response.finish_reason, FinishReason::ContentFilter);
}
