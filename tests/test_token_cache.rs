//! Bearer token caching under concurrency and against a real token endpoint

use agentpair::auth::default::CredentialSource;
use agentpair::auth::{BearerTokenCache, DefaultCredential};
use agentpair::testing::mocks::MockCredential;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCOPE: &str = "https://cognitiveservices.azure.com/.default";

#[tokio::test]
async fn test_concurrent_callers_share_one_fetch() {
    let credential = Arc::new(
        MockCredential::new(chrono::Duration::minutes(30))
            .with_fetch_delay(Duration::from_millis(50)),
    );
    let cache = Arc::new(BearerTokenCache::new(credential.clone(), SCOPE));

    let tasks = (0..16).map(|_| {
        let cache = cache.clone();
        tokio::spawn(async move { cache.token().await })
    });
    let tokens: Vec<String> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(credential.fetch_count(), 1);
    assert!(tokens.iter().all(|t| t == "mock-token-1"));
}

#[tokio::test]
async fn test_cache_over_identity_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "endpoint-token",
            "expires_in": "3600",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = DefaultCredential::with_source(CredentialSource::ManagedIdentity {
        endpoint: format!("{}/msi/token", server.uri()),
        header: "identity-header".to_string(),
        client_id: Some("client-1".to_string()),
    })
    .unwrap();
    let cache = BearerTokenCache::new(Arc::new(credential), SCOPE);

    for _ in 0..3 {
        assert_eq!(
            cache.authorization_header().await.unwrap(),
            "Bearer endpoint-token"
        );
    }
    // `expect(1)` is verified when the server drops
}

#[tokio::test]
async fn test_failed_fetch_is_retried_on_next_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "second-try",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;

    let credential = DefaultCredential::with_source(CredentialSource::ManagedIdentity {
        endpoint: format!("{}/msi/token", server.uri()),
        header: "identity-header".to_string(),
        client_id: None,
    })
    .unwrap();
    let cache = BearerTokenCache::new(Arc::new(credential), SCOPE);

    assert!(cache.token().await.is_err());
    assert_eq!(cache.token().await.unwrap(), "second-try");
}
