//! Custom JSON extractor with OpenAI-compatible error responses
//!
//! Wraps Axum's `Json` extractor to produce OpenAI-formatted error responses
//! when deserialization fails. This ensures compatibility with OpenAI SDKs
//! like LangChain and the official OpenAI Python/JS libraries.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// OpenAI-compatible error response structure
///
/// OpenAI SDKs expect errors in this format:
/// ```json
/// {
///   "error": {
///     "message": "...",
///     "type": "invalid_request_error",
///     "param": null,
///     "code": null
///   }
/// }
/// ```
#[derive(Debug, Clone, serde::Serialize)]
pub struct OpenAiError {
    pub error: OpenAiErrorBody,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OpenAiErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    /// Create a new OpenAI-formatted error for invalid requests
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            error: OpenAiErrorBody {
                message: message.into(),
                error_type: "invalid_request_error".to_string(),
                param: None,
                code: None,
            },
        }
    }

    /// Create a new OpenAI-formatted error for server errors
    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            error: OpenAiErrorBody {
                message: message.into(),
                error_type: "server_error".to_string(),
                param: None,
                code: None,
            },
        }
    }

    /// Error for a request no Retool account could serve
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self {
            error: OpenAiErrorBody {
                message: message.into(),
                error_type: "server_error".to_string(),
                param: None,
                code: Some("service_unavailable".to_string()),
            },
        }
    }

    /// Error for a missing, malformed or unknown API key
    pub fn invalid_api_key(message: impl Into<String>) -> Self {
        Self {
            error: OpenAiErrorBody {
                message: message.into(),
                error_type: "invalid_request_error".to_string(),
                param: None,
                code: Some("invalid_api_key".to_string()),
            },
        }
    }

    /// Create an error with a specific parameter that failed validation
    pub fn invalid_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            error: OpenAiErrorBody {
                message: message.into(),
                error_type: "invalid_request_error".to_string(),
                param: Some(param.into()),
                code: None,
            },
        }
    }
}

/// OpenAI-compatible JSON extraction error
///
/// Wraps Axum's `JsonRejection` to produce OpenAI-formatted error responses.
/// Uses appropriate HTTP status codes based on the type of rejection:
/// - JSON syntax and validation errors → 400 Bad Request
/// - Missing content type → 415 Unsupported Media Type
pub struct OpenAiJsonRejection(JsonRejection);

impl IntoResponse for OpenAiJsonRejection {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_) => {
                (StatusCode::BAD_REQUEST, self.0.body_text())
            }
            JsonRejection::MissingJsonContentType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type must be application/json".to_string(),
            ),
            _ => {
                // BytesRejection or future rejection types
                (StatusCode::BAD_REQUEST, self.0.body_text())
            }
        };
        let error = OpenAiError::invalid_request(message);
        (status, Json(error)).into_response()
    }
}

/// Custom JSON extractor that produces OpenAI-compatible error responses
///
/// Use this instead of `axum::Json` in OpenAI-compatible handlers to ensure
/// validation errors are returned in the format expected by OpenAI SDKs.
///
/// # Example
///
/// ```ignore
/// use rever::handlers::openai::extractor::OpenAiJson;
///
/// pub async fn handler(
///     OpenAiJson(request): OpenAiJson<ChatCompletionRequest>,
/// ) -> Result<Response, AppError> {
///     // If request deserialization fails, an OpenAI-formatted error is returned
///     // automatically
/// }
/// ```
pub struct OpenAiJson<T>(pub T);

impl<S, T> FromRequest<S> for OpenAiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = OpenAiJsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(OpenAiJson(value)),
            Err(rejection) => Err(OpenAiJsonRejection(rejection)),
        }
    }
}
