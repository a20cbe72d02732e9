//! Error types for Rever
//!
//! `AppError` is the handler-facing error and implements `IntoResponse` for Axum.
//! Upstream and orchestration failures have their own enums (`UpstreamError`,
//! `CompletionError`) and only reach clients through `AppError`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::handlers::openai::extractor::OpenAiError;
use crate::shared::completion::CompletionError;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("model '{0}' not found")]
    ModelNotFound(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, OpenAiError::invalid_request(msg)),
            Self::ModelNotFound(_) => (
                StatusCode::NOT_FOUND,
                OpenAiError::invalid_param(self.to_string(), "model"),
            ),
            // Every orchestration failure collapses to one "service unavailable"
            // condition; which accounts failed is only logged.
            Self::Completion(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                OpenAiError::service_unavailable(self.to_string()),
            ),
            Self::Config(_)
            | Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. }
            | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                OpenAiError::server_error(self.to_string()),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
