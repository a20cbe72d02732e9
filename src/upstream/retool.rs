//! HTTP implementation of the Retool agent protocol

use super::{Agent, RunId, ThreadId, UpstreamClient, UpstreamError};
use crate::config::{AccountConfig, UpstreamConfig};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::Instant;

/// Run-log statuses that end a run without a result
const FAILED_RUN_STATUSES: [&str; 4] = ["FAILED", "ERROR", "CANCELLED", "CANCELED"];

/// Retool client shared by all accounts
///
/// Holds one pooled `reqwest::Client`; per-account credentials are attached
/// to each request.
#[derive(Debug, Clone)]
pub struct RetoolClient {
    http: reqwest::Client,
    scheme: String,
    timezone: String,
    poll_interval: Duration,
    max_poll_errors: u32,
}

impl RetoolClient {
    /// Create a client from the `[upstream]` configuration
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            scheme: config.scheme.clone(),
            timezone: config.timezone.clone(),
            poll_interval: config.poll_interval(),
            max_poll_errors: config.max_poll_errors,
        })
    }

    fn url(&self, account: &AccountConfig, path: &str) -> String {
        format!("{}://{}{}", self.scheme, account.domain_name(), path)
    }

    fn request(&self, method: Method, account: &AccountConfig, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(account, path))
            .header("x-xsrf-token", account.xsrf_token())
            .header(
                reqwest::header::COOKIE,
                format!("accessToken={}", account.access_token()),
            )
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send a request and decode its JSON body, classifying failures
    async fn send_json<T: DeserializeOwned>(
        &self,
        account: &AccountConfig,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, UpstreamError> {
        let unreachable = |reason: String| UpstreamError::Unreachable {
            domain: account.domain_name().to_string(),
            operation,
            reason,
        };

        let response = request.send().await.map_err(|e| unreachable(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(UpstreamError::Unauthorized {
                domain: account.domain_name().to_string(),
                operation,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| unreachable(format!("invalid response body: {}", e)))
    }

    async fn fetch_run_log(
        &self,
        account: &AccountConfig,
        agent_id: &str,
        run: &RunId,
    ) -> Result<RunLog, UpstreamError> {
        let path = format!("/api/agents/{}/logs/{}", agent_id, run);
        self.send_json(account, "get_run_log", self.request(Method::GET, account, &path))
            .await
    }
}

#[async_trait]
impl UpstreamClient for RetoolClient {
    async fn list_agents(&self, account: &AccountConfig) -> Result<Vec<Agent>, UpstreamError> {
        let body: AgentsResponse = self
            .send_json(
                account,
                "list_agents",
                self.request(Method::GET, account, "/api/agents"),
            )
            .await?;

        Ok(body.agents.into_iter().map(Agent::from).collect())
    }

    async fn open_thread(
        &self,
        account: &AccountConfig,
        agent_id: &str,
    ) -> Result<ThreadId, UpstreamError> {
        let path = format!("/api/agents/{}/threads", agent_id);
        let request = self
            .request(Method::POST, account, &path)
            .json(&serde_json::json!({ "name": "", "timezone": "" }));

        let body: ThreadResponse = self.send_json(account, "open_thread", request).await?;
        Ok(ThreadId(body.id))
    }

    async fn post_message(
        &self,
        account: &AccountConfig,
        agent_id: &str,
        thread: &ThreadId,
        text: &str,
    ) -> Result<RunId, UpstreamError> {
        let path = format!("/api/agents/{}/threads/{}/messages", agent_id, thread);
        let request = self
            .request(Method::POST, account, &path)
            .json(&serde_json::json!({
                "type": "text",
                "text": text,
                "timezone": self.timezone,
            }));

        let body: MessageResponse = self.send_json(account, "post_message", request).await?;
        Ok(RunId(body.content.run_id))
    }

    async fn await_run(
        &self,
        account: &AccountConfig,
        agent_id: &str,
        run: &RunId,
        timeout: Duration,
    ) -> Result<String, UpstreamError> {
        let deadline = Instant::now() + timeout;
        let mut consecutive_errors = 0u32;
        let mut polls = 0u32;

        loop {
            polls += 1;
            match self.fetch_run_log(account, agent_id, run).await {
                Ok(log) => {
                    consecutive_errors = 0;
                    match log.outcome() {
                        RunOutcome::Completed(content) => {
                            tracing::debug!(
                                domain = %account.domain_name(),
                                run_id = %run,
                                polls = polls,
                                response_length = content.len(),
                                "Run completed"
                            );
                            return Ok(content);
                        }
                        RunOutcome::Failed(status) => {
                            return Err(UpstreamError::RunFailed {
                                domain: account.domain_name().to_string(),
                                run_id: run.to_string(),
                                status,
                            });
                        }
                        RunOutcome::Pending => {}
                    }
                }
                Err(e) if e.is_unauthorized() => return Err(e),
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > self.max_poll_errors {
                        tracing::warn!(
                            domain = %account.domain_name(),
                            run_id = %run,
                            consecutive_errors = consecutive_errors,
                            error = %e,
                            "Giving up on run after repeated poll failures"
                        );
                        return Err(e);
                    }
                    tracing::debug!(
                        domain = %account.domain_name(),
                        run_id = %run,
                        consecutive_errors = consecutive_errors,
                        error = %e,
                        "Run log fetch failed, retrying"
                    );
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            if Instant::now() >= deadline {
                return Err(UpstreamError::Timeout {
                    domain: account.domain_name().to_string(),
                    run_id: run.to_string(),
                    timeout_seconds: timeout.as_secs(),
                });
            }
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    #[serde(default)]
    agents: Vec<RawAgent>,
}

#[derive(Debug, Deserialize)]
struct RawAgent {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    data: Option<RawAgentData>,
}

#[derive(Debug, Deserialize)]
struct RawAgentData {
    #[serde(default)]
    model: Option<String>,
}

impl From<RawAgent> for Agent {
    fn from(raw: RawAgent) -> Self {
        let model = raw
            .data
            .and_then(|d| d.model)
            .unwrap_or_else(|| "unknown".to_string());
        Agent {
            id: raw.id,
            name: raw.name,
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "runId")]
    run_id: String,
}

#[derive(Debug, Deserialize)]
struct RunLog {
    status: String,
    #[serde(default)]
    trace: Vec<serde_json::Value>,
}

#[derive(Debug, PartialEq, Eq)]
enum RunOutcome {
    Completed(String),
    Failed(String),
    Pending,
}

impl RunLog {
    /// Interpret the log: the answer is `data.data.content` of the last trace entry
    fn outcome(self) -> RunOutcome {
        if self.status == "COMPLETED" {
            let content = self
                .trace
                .last()
                .and_then(|entry| entry.pointer("/data/data/content"))
                .and_then(|v| v.as_str());
            return match content {
                Some(text) => RunOutcome::Completed(text.to_string()),
                None => RunOutcome::Failed("COMPLETED (no content in trace)".to_string()),
            };
        }

        let upper = self.status.to_ascii_uppercase();
        if FAILED_RUN_STATUSES.contains(&upper.as_str()) {
            RunOutcome::Failed(self.status)
        } else {
            RunOutcome::Pending
        }
    }
}
