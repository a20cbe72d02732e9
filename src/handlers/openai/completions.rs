//! OpenAI-compatible chat completions handler
//!
//! Handles POST /v1/chat/completions requests (both streaming and non-streaming).

use crate::error::AppError;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::shared::translate::{OutputPayload, render};
use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};

use super::extractor::OpenAiJson;
use super::streaming::sse_response;
use super::types::ChatCompletionRequest;

/// POST /v1/chat/completions
///
/// Unknown models are rejected with 404 before any account is touched. Once
/// orchestration has run, non-streaming failures become a 503 error body while
/// streaming failures are delivered in-band as one error chunk and `[DONE]`.
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    OpenAiJson(request): OpenAiJson<ChatCompletionRequest>,
) -> Result<Response, AppError> {
    tracing::debug!(
        request_id = %request_id,
        model = %request.model(),
        messages_count = request.messages().len(),
        stream = request.stream(),
        "Received chat completions request"
    );

    let registry = state.registry().snapshot().await;
    let model = registry.get(request.model()).ok_or_else(|| {
        tracing::info!(
            request_id = %request_id,
            model = %request.model(),
            available_models = registry.len(),
            "Rejecting request for unknown model"
        );
        AppError::ModelNotFound(request.model().to_string())
    })?;

    let prompt = request.to_prompt_string();
    let started = std::time::Instant::now();
    let outcome = state
        .orchestrator()
        .complete(model, &prompt, request_id)
        .await;

    let mode = if request.stream() { "stream" } else { "json" };
    state
        .metrics()
        .completion(mode, outcome.is_ok(), started.elapsed());

    let streaming = &state.config().streaming;
    match render(outcome, request.stream(), streaming.chunk_chars) {
        OutputPayload::Completion(completion) => {
            tracing::info!(
                request_id = %request_id,
                completion_id = %completion.id,
                model = %completion.model,
                "Chat completion successful"
            );
            Ok(Json(completion).into_response())
        }
        OutputPayload::Stream(events) => {
            Ok(sse_response(events, streaming.chunk_delay(), request_id))
        }
        OutputPayload::Failure(error) => Err(AppError::from(error)),
    }
}
