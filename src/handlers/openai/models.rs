//! OpenAI-compatible models list handler
//!
//! Handles GET /v1/models (authenticated) and GET /models (public).

use crate::handlers::AppState;
use axum::{Json, extract::State, response::IntoResponse};

use super::types::{ModelObject, ModelsListResponse};
use crate::shared::current_timestamp;

/// GET /v1/models handler
///
/// Lists the logical models of the current registry snapshot, in discovery
/// order. Each entry has:
/// - `id`: logical model id (`claude-sonnet-4`)
/// - `object`: "model"
/// - `created`: time of this response
/// - `owned_by`: "anthropic" or "openai"
/// - `name`: `"{agent name} ({upstream model name})"`
pub async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry().snapshot().await;
    let created = current_timestamp();

    let models: Vec<ModelObject> = registry
        .models()
        .iter()
        .map(|record| ModelObject::from_record(record, created))
        .collect();

    tracing::debug!(models = models.len(), "Listing models");

    Json(ModelsListResponse::new(models))
}
