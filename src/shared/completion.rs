//! Completion orchestration with account failover
//!
//! One request runs a small state machine:
//!
//! ```text
//! Selecting ──▶ Executing ──▶ Succeeded
//!     ▲             │
//!     └── Failing ◀─┘
//! ```
//!
//! Each pass through `Selecting` may start one attempt on an account this
//! request has not tried yet, so at most one attempt per configured account is
//! made. Running out of eligible accounts before the
//! first attempt (`NoEligibleAccount`) is kept distinct from every attempted
//! account failing (`AllAttemptsFailed`).

use crate::metrics::Metrics;
use crate::middleware::RequestId;
use crate::models::{AccountId, AccountPool, ModelRecord, Selection};
use crate::upstream::{UpstreamClient, UpstreamError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::current_timestamp;

/// Terminal failure of one completion request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("no eligible retool account available")]
    NoEligibleAccount,

    #[error("all retool attempts failed ({attempts} attempts)")]
    AllAttemptsFailed { attempts: usize },
}

/// Final text of a successful completion plus response metadata
///
/// `id` and `created` are generated once, so every rendering of this result
/// (one JSON body or every chunk of a stream) shares them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub id: String,
    pub model: String,
    pub created: i64,
    pub content: String,
}

impl CompletionResult {
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            model: model.into(),
            created: current_timestamp(),
            content: content.into(),
        }
    }
}

enum AttemptState {
    Selecting,
    Executing(Selection),
    Failing(Selection, UpstreamError),
    Succeeded(Selection, String),
}

/// Drives completions through the account pool
#[derive(Clone)]
pub struct Orchestrator {
    pool: Arc<AccountPool>,
    client: Arc<dyn UpstreamClient>,
    metrics: Arc<Metrics>,
    run_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        pool: Arc<AccountPool>,
        client: Arc<dyn UpstreamClient>,
        metrics: Arc<Metrics>,
        run_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            client,
            metrics,
            run_timeout,
        }
    }

    /// Complete `prompt` on some account able to serve `model`
    ///
    /// Upstream failures never escape this function; they become pool health
    /// updates and, once the pool is exhausted, a [`CompletionError`].
    pub async fn complete(
        &self,
        model: &ModelRecord,
        prompt: &str,
        request_id: RequestId,
    ) -> Result<CompletionResult, CompletionError> {
        let budget = self.pool.len();
        let mut attempts = 0usize;
        let mut tried: HashSet<AccountId> = HashSet::with_capacity(budget);
        let mut state = AttemptState::Selecting;

        loop {
            state = match state {
                AttemptState::Selecting => {
                    if attempts >= budget {
                        return Err(self.exhausted(model, attempts, request_id));
                    }
                    match self.pool.select_excluding(model, &tried).await {
                        Some(selection) => {
                            attempts += 1;
                            tried.insert(selection.account);
                            tracing::debug!(
                                request_id = %request_id,
                                model = %model.id,
                                account = %selection.account,
                                domain = %selection.domain(),
                                agent_id = %selection.agent_id,
                                attempt = attempts,
                                max_attempts = budget,
                                "Attempting upstream run"
                            );
                            AttemptState::Executing(selection)
                        }
                        None => return Err(self.exhausted(model, attempts, request_id)),
                    }
                }
                AttemptState::Executing(selection) => {
                    match self.execute(&selection, prompt).await {
                        Ok(text) => AttemptState::Succeeded(selection, text),
                        Err(e) => AttemptState::Failing(selection, e),
                    }
                }
                AttemptState::Failing(selection, error) => {
                    let record = self.pool.record_failure(selection.account, &error).await;
                    self.metrics.upstream_attempt(error.kind());
                    if record.invalidated {
                        self.metrics.account_invalidated();
                    }
                    tracing::warn!(
                        request_id = %request_id,
                        model = %model.id,
                        account = %selection.account,
                        domain = %selection.domain(),
                        attempt = attempts,
                        error_kind = error.kind(),
                        error_count = record.error_count,
                        invalidated = record.invalidated,
                        error = %error,
                        "Upstream attempt failed"
                    );
                    AttemptState::Selecting
                }
                AttemptState::Succeeded(selection, text) => {
                    self.pool.record_success(selection.account).await;
                    self.metrics.upstream_attempt("success");
                    tracing::info!(
                        request_id = %request_id,
                        model = %model.id,
                        account = %selection.account,
                        domain = %selection.domain(),
                        attempt = attempts,
                        response_length = text.len(),
                        "Completion succeeded"
                    );
                    return Ok(CompletionResult::new(model.id.clone(), text));
                }
            };
        }
    }

    /// Run the thread → message → poll exchange for one attempt
    async fn execute(&self, selection: &Selection, prompt: &str) -> Result<String, UpstreamError> {
        let account = selection.config.as_ref();
        let agent_id = selection.agent_id.as_str();

        let thread = self.client.open_thread(account, agent_id).await?;
        let run = self
            .client
            .post_message(account, agent_id, &thread, prompt)
            .await?;
        self.client
            .await_run(account, agent_id, &run, self.run_timeout)
            .await
    }

    fn exhausted(&self, model: &ModelRecord, attempts: usize, request_id: RequestId) -> CompletionError {
        let error = if attempts == 0 {
            CompletionError::NoEligibleAccount
        } else {
            CompletionError::AllAttemptsFailed { attempts }
        };
        tracing::error!(
            request_id = %request_id,
            model = %model.id,
            attempts = attempts,
            pool_size = self.pool.len(),
            bound_accounts = model.bindings.len(),
            error = %error,
            "Completion failed"
        );
        error
    }
}
