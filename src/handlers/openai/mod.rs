//! OpenAI-compatible API handlers
//!
//! - `POST /v1/chat/completions` - Chat completions, JSON or simulated SSE streaming
//! - `GET /v1/models` - List logical models discovered across accounts

pub mod completions;
pub mod extractor;
pub mod models;
pub mod streaming;
pub mod types;
