//! Rever - OpenAI-compatible chat completions over a pool of Retool agents
//!
//! Discovers the agents of every configured Retool account, groups them into
//! logical models, and serves `/v1/chat/completions` by running the prompt on
//! an agent thread, failing over between accounts as they error out.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod shared;
pub mod telemetry;
pub mod upstream;
