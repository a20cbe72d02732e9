//! Retool agent API client
//!
//! The upstream has no chat-completions endpoint. Every completion is a
//! four-step exchange against one account:
//!
//! 1. list the account's agents (done once, at discovery)
//! 2. open a thread on an agent
//! 3. post the formatted conversation into the thread, which starts a run
//! 4. poll the run log until the run completes, fails, or times out
//!
//! [`UpstreamClient`] is the seam the orchestrator and discovery depend on;
//! [`RetoolClient`] is the HTTP implementation.

pub mod retool;

pub use retool::RetoolClient;

use crate::config::AccountConfig;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// An agent as reported by `GET /api/agents`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// Underlying model name, e.g. `claude-sonnet-4-20250522`
    pub model: String,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Remote thread id, valid for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadId(pub String);

/// Remote run id, valid for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(pub String);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure of one upstream call
///
/// Only `Unauthorized` is permanent; everything else is counted against the
/// account and forgiven after the cool-down.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("{operation} rejected by {domain} (HTTP {status})")]
    Unauthorized {
        domain: String,
        operation: &'static str,
        status: u16,
    },

    #[error("{operation} against {domain} failed: {reason}")]
    Unreachable {
        domain: String,
        operation: &'static str,
        reason: String,
    },

    #[error("run {run_id} on {domain} did not complete within {timeout_seconds}s")]
    Timeout {
        domain: String,
        run_id: String,
        timeout_seconds: u64,
    },

    #[error("run {run_id} on {domain} ended with status {status}")]
    RunFailed {
        domain: String,
        run_id: String,
        status: String,
    },
}

impl UpstreamError {
    /// True when the account's credentials were rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout { .. } => "timeout",
            Self::RunFailed { .. } => "run_failed",
        }
    }
}

/// The four-step Retool protocol, addressed per account
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// List the agents visible to `account`
    async fn list_agents(&self, account: &AccountConfig) -> Result<Vec<Agent>, UpstreamError>;

    /// Open a fresh thread on `agent_id`
    async fn open_thread(
        &self,
        account: &AccountConfig,
        agent_id: &str,
    ) -> Result<ThreadId, UpstreamError>;

    /// Post `text` into `thread`, starting a run
    async fn post_message(
        &self,
        account: &AccountConfig,
        agent_id: &str,
        thread: &ThreadId,
        text: &str,
    ) -> Result<RunId, UpstreamError>;

    /// Poll `run` until it reaches a terminal state or `timeout` elapses
    async fn await_run(
        &self,
        account: &AccountConfig,
        agent_id: &str,
        run: &RunId,
        timeout: Duration,
    ) -> Result<String, UpstreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unauthorized_is_permanent() {
        let unauthorized = UpstreamError::Unauthorized {
            domain: "a.retool.com".to_string(),
            operation: "open_thread",
            status: 403,
        };
        let timeout = UpstreamError::Timeout {
            domain: "a.retool.com".to_string(),
            run_id: "r1".to_string(),
            timeout_seconds: 300,
        };
        assert!(unauthorized.is_unauthorized());
        assert!(!timeout.is_unauthorized());
        assert_eq!(unauthorized.kind(), "unauthorized");
        assert_eq!(timeout.kind(), "timeout");
    }

    #[test]
    fn test_error_messages_name_the_account() {
        let err = UpstreamError::RunFailed {
            domain: "a.retool.com".to_string(),
            run_id: "run-7".to_string(),
            status: "FAILED".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "run run-7 on a.retool.com ended with status FAILED"
        );
    }
}
