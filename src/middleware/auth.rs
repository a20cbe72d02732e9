//! Bearer-token authentication for the OpenAI-compatible routes
//!
//! Clients send `Authorization: Bearer <key>`; the key must be one of
//! `auth.api_keys`. A missing or malformed header is a 401, a well-formed but
//! unknown key a 403, both with an OpenAI-shaped error body.

use crate::handlers::AppState;
use crate::handlers::openai::extractor::OpenAiError;
use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively; an empty token is malformed.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token);

    match token {
        None => {
            tracing::debug!(
                path = %request.uri().path(),
                "Rejecting request without bearer token"
            );
            reject(
                StatusCode::UNAUTHORIZED,
                "Missing or malformed Authorization header, expected 'Bearer <key>'",
            )
        }
        Some(key) if !state.config().auth.accepts(key) => {
            tracing::warn!(
                path = %request.uri().path(),
                "Rejecting request with unknown API key"
            );
            reject(StatusCode::FORBIDDEN, "Invalid API key")
        }
        Some(_) => next.run(request).await,
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(OpenAiError::invalid_api_key(message))).into_response()
}
