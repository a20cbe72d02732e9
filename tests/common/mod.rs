//! Shared fixtures: a wiremock stand-in for a Retool tenant and a router
//! wired to one or more of them.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use rever::{
    config::Config,
    handlers::{self, AppState},
    upstream::RetoolClient,
};
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const API_KEY: &str = "sk-test-key";

/// One mocked Retool account
pub struct RetoolMock {
    pub server: MockServer,
}

impl RetoolMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Host and port, used as the account's `domain_name`
    pub fn domain(&self) -> String {
        self.server.address().to_string()
    }

    /// Serve `GET /api/agents` with `(id, name, model)` triples
    pub async fn with_agents(&self, agents: &[(&str, &str, &str)]) {
        let agents: Vec<Value> = agents
            .iter()
            .map(|(id, name, model)| json!({ "id": id, "name": name, "data": { "model": model } }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": agents })))
            .mount(&self.server)
            .await;
    }

    /// Make every run of `agent_id` complete with `answer`
    pub async fn answering(&self, agent_id: &str, answer: &str) {
        self.open_threads(agent_id).await;
        Mock::given(method("POST"))
            .and(path(format!("/api/agents/{}/threads/thread-1/messages", agent_id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "content": { "runId": "run-1" } })),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/api/agents/{}/logs/run-1", agent_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(completed_log(answer)))
            .mount(&self.server)
            .await;
    }

    /// Make thread creation for `agent_id` fail with `status`
    pub async fn rejecting_threads(&self, agent_id: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/api/agents/{}/threads", agent_id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn open_threads(&self, agent_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/api/agents/{}/threads", agent_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "thread-1" })))
            .mount(&self.server)
            .await;
    }

    /// Number of threads opened on this account
    pub async fn threads_opened(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST" && r.url.path().ends_with("/threads"))
            .count()
    }
}

pub fn completed_log(answer: &str) -> Value {
    json!({
        "status": "COMPLETED",
        "trace": [
            { "data": { "data": { "content": "intermediate step" } } },
            { "data": { "data": { "content": answer } } }
        ]
    })
}

/// Config pointing at the given mock accounts over plain HTTP, with fast polling
pub fn config_for(domains: &[String]) -> Config {
    let mut toml = format!(
        r#"
[server]
host = "127.0.0.1"

[auth]
api_keys = ["{}"]

[upstream]
scheme = "http"
poll_interval_ms = 5
run_timeout_seconds = 5

[streaming]
chunk_chars = 5
chunk_delay_ms = 1
"#,
        API_KEY
    );
    for (i, domain) in domains.iter().enumerate() {
        toml.push_str(&format!(
            "\n[[accounts]]\ndomain_name = \"{}\"\nxsrf_token = \"xsrf-{}\"\naccess_token = \"token-{}\"\n",
            domain, i, i
        ));
    }
    toml.parse().expect("test config is valid")
}

/// Router over real `RetoolClient`s talking to the mocks, after discovery
pub async fn app_for(mocks: &[&RetoolMock]) -> (Router, AppState) {
    let domains: Vec<String> = mocks.iter().map(|m| m.domain()).collect();
    let config = config_for(&domains);
    let client = RetoolClient::new(&config.upstream).expect("client builds");
    let state = AppState::new(config, Arc::new(client)).expect("state builds");
    state.refresh_models().await;
    (handlers::router(state.clone()), state)
}

pub fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", API_KEY))
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = key {
        builder = builder.header("authorization", format!("Bearer {}", key));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).expect("JSON body")
}

/// `data:` payloads of an SSE body, in order
pub fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_string())
        .collect()
}
