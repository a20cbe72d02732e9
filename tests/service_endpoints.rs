//! Authentication, model listing and operational endpoints

mod common;

use axum::http::StatusCode;
use common::{API_KEY, RetoolMock, app_for, body_json, body_string, chat_request, get};
use serde_json::json;
use tower::ServiceExt;

async fn two_model_account() -> RetoolMock {
    let account = RetoolMock::start().await;
    account
        .with_agents(&[
            ("a1", "Sonnet", "claude-sonnet-4-20250522"),
            ("a2", "Mini", "gpt-4o-mini-2024-07-18"),
        ])
        .await;
    account
}

#[tokio::test]
async fn test_missing_api_key_is_unauthorized() {
    let account = two_model_account().await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(get("/v1/models", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_api_key");
}

#[tokio::test]
async fn test_wrong_api_key_is_forbidden() {
    let account = two_model_account().await;
    let (app, _) = app_for(&[&account]).await;

    let response = app
        .oneshot(get("/v1/models", Some("sk-not-ours")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_completions_require_api_key_before_anything_else() {
    let account = two_model_account().await;
    account.answering("a1", "unused").await;
    let (app, _) = app_for(&[&account]).await;

    let mut request = chat_request(json!({
        "model": "claude-sonnet-4",
        "messages": [{ "role": "user", "content": "Hello" }]
    }));
    request.headers_mut().remove("authorization");
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(account.threads_opened().await, 0);
}

#[tokio::test]
async fn test_models_lists_discovered_logical_models() {
    let account = two_model_account().await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(get("/v1/models", Some(API_KEY))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["object"], "list");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);

    let sonnet = data
        .iter()
        .find(|m| m["id"] == "claude-sonnet-4")
        .expect("claude-sonnet-4 listed");
    assert_eq!(sonnet["object"], "model");
    assert_eq!(sonnet["owned_by"], "anthropic");
    assert_eq!(sonnet["name"], "Sonnet (claude-sonnet-4-20250522)");

    let mini = data
        .iter()
        .find(|m| m["id"] == "gpt-4o-mini")
        .expect("gpt-4o-mini listed");
    assert_eq!(mini["owned_by"], "openai");
}

#[tokio::test]
async fn test_public_models_needs_no_key() {
    let account = two_model_account().await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(get("/models", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_same_model_on_two_accounts_is_listed_once() {
    let first = two_model_account().await;
    let second = two_model_account().await;
    let (app, state) = app_for(&[&first, &second]).await;

    let response = app.oneshot(get("/models", None)).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let snapshot = state.registry().try_snapshot().unwrap();
    assert_eq!(snapshot.get("claude-sonnet-4").unwrap().bindings.len(), 2);
}

#[tokio::test]
async fn test_health_reports_pool_and_models() {
    let account = two_model_account().await;
    let (app, _) = app_for(&[&account]).await;

    let response = app.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["models"], 2);
    assert_eq!(body["accounts"], 1);
    assert_eq!(body["eligible_accounts"], 1);
}

#[tokio::test]
async fn test_debug_toggle() {
    let account = two_model_account().await;
    let (app, state) = app_for(&[&account]).await;

    let body = body_json(app.clone().oneshot(get("/debug", None)).await.unwrap()).await;
    assert_eq!(body["debug_mode"], false);

    let body = body_json(
        app.clone()
            .oneshot(get("/debug?enable=true", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["debug_mode"], true);
    assert!(state.log_control().is_debug());

    let body = body_json(
        app.clone()
            .oneshot(get("/debug?enable=false", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["debug_mode"], false);
}

#[tokio::test]
async fn test_debug_values_other_than_true_disable() {
    let account = two_model_account().await;
    let (app, state) = app_for(&[&account]).await;
    state.log_control().set_debug(true).unwrap();

    let response = app
        .oneshot(get("/debug?enable=yes", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["debug_mode"], false);
    assert!(!state.log_control().is_debug());
}

#[tokio::test]
async fn test_metrics_exposes_completion_counters() {
    let account = two_model_account().await;
    account.answering("a1", "ok").await;
    let (app, _) = app_for(&[&account]).await;

    let response = app
        .clone()
        .oneshot(chat_request(json!({
            "model": "claude-sonnet-4",
            "messages": [{ "role": "user", "content": "Hello" }]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = body_string(response).await;
    assert!(text.contains("rever_completions_total"));
    assert!(text.contains("mode=\"json\""));
    assert!(text.contains("rever_discovered_agents 2"));
}

#[tokio::test]
async fn test_unreachable_account_is_skipped_at_discovery() {
    let reachable = two_model_account().await;
    let silent = RetoolMock::start().await;
    // No agents mock mounted: wiremock answers 404
    let (app, state) = app_for(&[&silent, &reachable]).await;

    let response = app.oneshot(get("/models", None)).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let snapshot = state.registry().try_snapshot().unwrap();
    let bindings = &snapshot.get("gpt-4o-mini").unwrap().bindings;
    assert_eq!(bindings.len(), 1);
}
