//! A2A front-end behavior through the full service filter


use agentpair::config::{AgentKind, ServiceConfig};
use agentpair::testing::mocks::MockLlmProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use test_helpers::{
    reviewer_service, reviewer_service_with, send_params, uninitialized_reviewer_service,
    writer_service,
};

fn body_json(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn reply_text(body: &Value) -> String {
    body["message"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_agent_card_is_served_at_every_card_path() {
    let filter = reviewer_service(Arc::new(MockLlmProvider::default()));

    let mut cards = Vec::new();
    for path in [
        "/a2a/.well-known/agent-card.json",
        "/a2a/.well-known/agent.json",
        "/a2a/v1/card",
    ] {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 200, "{path}");
        cards.push(body_json(&response));
    }

    assert_eq!(cards[0], cards[1]);
    assert_eq!(cards[0], cards[2]);

    let card = &cards[0];
    assert_eq!(card["name"], "reviewer-agent");
    assert_eq!(card["url"], "http://localhost/a2a");
    assert_eq!(card["preferredTransport"], "HTTP+JSON");
    assert_eq!(card["capabilities"]["streaming"], json!(true));
    assert_eq!(card["capabilities"]["pushNotifications"], json!(false));
    assert_eq!(card["defaultInputModes"], json!(["text/plain"]));
    assert_eq!(card["skills"][0]["id"], "review-summary");
}

#[tokio::test]
async fn test_card_follows_configured_prefix_and_public_url() {
    let mut config = ServiceConfig::defaults(AgentKind::Reviewer);
    config.a2a.base_path = "/agents/reviewer".to_string();
    config.a2a.public_url = "https://reviewer.example.com/".to_string();
    let filter = reviewer_service_with(config, Arc::new(MockLlmProvider::default()));

    let response = warp::test::request()
        .method("GET")
        .path("/agents/reviewer/.well-known/agent-card.json")
        .reply(&filter)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        body_json(&response)["url"],
        "https://reviewer.example.com/agents/reviewer"
    );

    let default_prefix = warp::test::request()
        .method("GET")
        .path("/a2a/.well-known/agent-card.json")
        .reply(&filter)
        .await;
    assert_eq!(default_prefix.status(), 404);
}

#[tokio::test]
async fn test_send_message_answers_with_agent_text() {
    let provider = Arc::new(MockLlmProvider::single_response("Improved draft."));
    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:send")
        .json(&send_params(
            "Topic: Rust\nDraft: Rust are fast.",
            Some("ctx-42"),
        ))
        .reply(&reviewer_service(provider.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body = body_json(&response);
    assert_eq!(body["message"]["role"], "agent");
    assert_eq!(body["message"]["kind"], "message");
    assert_eq!(body["message"]["contextId"], "ctx-42");
    assert_eq!(reply_text(&body), "Improved draft.");

    let requests = provider.recorded_requests().await;
    assert_eq!(
        requests[0].messages[1].content,
        "Topic: Rust\n\nDraft summary:\nRust are fast.\n\nProduce the improved summary now."
    );
}

#[tokio::test]
async fn test_writer_uses_whole_text_as_topic() {
    let provider = Arc::new(MockLlmProvider::single_response("Summary."));
    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:send")
        .json(&send_params("  The history of Rust  ", None))
        .reply(&writer_service(provider.clone()))
        .await;

    assert_eq!(response.status(), 200);
    let body = body_json(&response);
    assert_eq!(reply_text(&body), "Summary.");
    assert!(body["message"]["contextId"].is_string());

    let requests = provider.recorded_requests().await;
    assert!(requests[0].messages[1]
        .content
        .contains("The history of Rust"));
}

#[tokio::test]
async fn test_responder_failure_is_a_text_reply() {
    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:send")
        .json(&send_params("Topic: a\nDraft: b", None))
        .reply(&uninitialized_reviewer_service())
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        reply_text(&body_json(&response)),
        "Error: internal server error"
    );
}

#[tokio::test]
async fn test_error_details_when_enabled() {
    let mut config = ServiceConfig::defaults(AgentKind::Reviewer);
    config.a2a.include_error_details = true;
    let filter = reviewer_service_with(config, Arc::new(MockLlmProvider::with_failure()));

    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:send")
        .json(&send_params("Topic: a\nDraft: b", None))
        .reply(&filter)
        .await;

    let text = reply_text(&body_json(&response));
    assert!(text.starts_with("Error: UpstreamFailure: "), "{text}");
}

#[tokio::test]
async fn test_invalid_send_params_are_400() {
    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:send")
        .json(&json!({"not": "a message"}))
        .reply(&reviewer_service(Arc::new(MockLlmProvider::default())))
        .await;

    assert_eq!(response.status(), 400);
    assert_eq!(body_json(&response)["code"], json!(-32602));
}

#[tokio::test]
async fn test_stream_emits_exactly_one_event() {
    let response = warp::test::request()
        .method("POST")
        .path("/a2a/v1/message:stream")
        .json(&send_params("Topic: a\nDraft: b", Some("ctx-s")))
        .reply(&reviewer_service(Arc::new(MockLlmProvider::single_response(
            "Streamed.",
        ))))
        .await;

    assert_eq!(response.status(), 200);
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    let events: Vec<Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();

    assert_eq!(events.len(), 1);
    assert_eq!(reply_text(&events[0]), "Streamed.");
    assert_eq!(events[0]["message"]["contextId"], "ctx-s");
}

#[tokio::test]
async fn test_task_operations_are_501() {
    let filter = reviewer_service(Arc::new(MockLlmProvider::default()));

    for (method, path) in [
        ("GET", "/a2a/v1/tasks/task-1"),
        ("POST", "/a2a/v1/tasks/task-1:cancel"),
        ("GET", "/a2a/v1/tasks/task-1/pushNotificationConfigs"),
        ("DELETE", "/a2a/v1/tasks/task-1/pushNotificationConfigs/cfg-1"),
    ] {
        let response = warp::test::request()
            .method(method)
            .path(path)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 501, "{method} {path}");
        assert_eq!(body_json(&response)["code"], json!(-32004));
    }
}
