//! End-to-end tests for POST /v1/chat/completions (non-streaming)
//!
//! The router runs with a real `RetoolClient` pointed at wiremock accounts.

mod common;

use axum::http::StatusCode;
use common::{RetoolMock, app_for, body_json, chat_request};
use serde_json::{Value, json};
use tower::ServiceExt;

const SONNET: (&str, &str, &str) = ("a1", "Sonnet", "claude-sonnet-4-20250522");

fn hello(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": "Hello" }]
    })
}

#[tokio::test]
async fn test_completion_returns_openai_shape() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    account.answering("a1", "Hi there, how can I help?").await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(chat_request(hello("claude-sonnet-4"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "claude-sonnet-4");
    assert!(body["created"].as_i64().unwrap() > 0);
    assert_eq!(body["choices"][0]["index"], 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(
        body["choices"][0]["message"]["content"],
        "Hi there, how can I help?"
    );
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 0);
}

#[tokio::test]
async fn test_conversation_is_posted_as_transcript() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    account.answering("a1", "ok").await;
    let (app, _) = app_for(&[&account]).await;

    let request = chat_request(json!({
        "model": "claude-sonnet-4",
        "messages": [
            { "role": "system", "content": "Be brief." },
            { "role": "user", "content": "Hello" },
            { "role": "assistant", "content": "Hi" },
            { "role": "user", "content": "Bye" }
        ]
    }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = account.server.received_requests().await.unwrap();
    let posted = requests
        .iter()
        .find(|r| r.url.path().ends_with("/messages"))
        .expect("message posted");
    let body: Value = serde_json::from_slice(&posted.body).unwrap();
    assert_eq!(
        body["text"],
        "\n\nAssistant: Be brief.\n\nHuman: Hello\n\nAssistant: Hi\n\nHuman: Bye"
    );
}

#[tokio::test]
async fn test_failing_account_fails_over_to_the_next() {
    let broken = RetoolMock::start().await;
    broken.with_agents(&[SONNET]).await;
    broken.rejecting_threads("a1", 500).await;
    let healthy = RetoolMock::start().await;
    healthy.with_agents(&[SONNET]).await;
    healthy.answering("a1", "from the second account").await;
    let (app, state) = app_for(&[&broken, &healthy]).await;

    let response = app.oneshot(chat_request(hello("claude-sonnet-4"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(
        body["choices"][0]["message"]["content"],
        "from the second account"
    );
    assert_eq!(broken.threads_opened().await, 1);
    assert_eq!(healthy.threads_opened().await, 1);

    let statuses = state.pool().statuses().await;
    assert_eq!(statuses[0].health.error_count(), 1);
    assert!(statuses[0].health.is_valid());
    assert_eq!(statuses[1].health.error_count(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_take_account_out_of_rotation() {
    let revoked = RetoolMock::start().await;
    revoked.with_agents(&[SONNET]).await;
    revoked.rejecting_threads("a1", 401).await;
    let healthy = RetoolMock::start().await;
    healthy.with_agents(&[SONNET]).await;
    healthy.answering("a1", "ok").await;
    let (app, state) = app_for(&[&revoked, &healthy]).await;

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(chat_request(hello("claude-sonnet-4")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(revoked.threads_opened().await, 1, "never retried after 401");
    assert_eq!(healthy.threads_opened().await, 3);
    assert!(!state.pool().statuses().await[0].health.is_valid());
    assert_eq!(state.metrics().accounts_invalidated_count(), 1);
}

#[tokio::test]
async fn test_all_accounts_failing_is_service_unavailable() {
    let first = RetoolMock::start().await;
    first.with_agents(&[SONNET]).await;
    first.rejecting_threads("a1", 500).await;
    let second = RetoolMock::start().await;
    second.with_agents(&[SONNET]).await;
    second.rejecting_threads("a1", 502).await;
    let (app, _) = app_for(&[&first, &second]).await;

    let response = app.oneshot(chat_request(hello("claude-sonnet-4"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "service_unavailable");
    assert_eq!(body["error"]["type"], "server_error");
    assert_eq!(first.threads_opened().await, 1);
    assert_eq!(second.threads_opened().await, 1);
}

#[tokio::test]
async fn test_unknown_model_is_not_found_without_upstream_calls() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    account.answering("a1", "unused").await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(chat_request(hello("gpt-9"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["param"], "model");
    assert!(body["error"]["message"].as_str().unwrap().contains("gpt-9"));
    assert_eq!(account.threads_opened().await, 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    let (app, _) = app_for(&[&account]).await;

    let mut request = chat_request(json!({}));
    *request.body_mut() = axum::body::Body::from("{\"model\": ");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_invalid_fields_are_bad_request() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    let (app, _) = app_for(&[&account]).await;

    for body in [
        json!({ "model": "claude-sonnet-4", "messages": [] }),
        json!({ "messages": [{ "role": "user", "content": "Hi" }] }),
        json!({ "model": "claude-sonnet-4", "messages": [{ "role": "user", "content": "" }] }),
        json!({ "model": "claude-sonnet-4", "messages": [{ "role": "tool", "content": "x" }] }),
        json!({
            "model": "claude-sonnet-4",
            "messages": [{ "role": "user", "content": "Hi" }],
            "temperature": 3.5
        }),
    ] {
        let response = app.clone().oneshot(chat_request(body.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
    assert_eq!(account.threads_opened().await, 0);
}

#[tokio::test]
async fn test_client_request_id_is_echoed() {
    let account = RetoolMock::start().await;
    account.with_agents(&[SONNET]).await;
    account.answering("a1", "ok").await;
    let (app, _) = app_for(&[&account]).await;

    let id = uuid::Uuid::new_v4().to_string();
    let mut request = chat_request(hello("claude-sonnet-4"));
    request
        .headers_mut()
        .insert("x-request-id", id.parse().unwrap());
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.headers()["x-request-id"], id.as_str());
}
