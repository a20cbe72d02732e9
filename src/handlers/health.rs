//! Health check endpoint handler

use crate::handlers::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Response for GET /health
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Logical models in the published registry (0 before discovery finishes)
    pub models: usize,
    pub accounts: usize,
    /// Accounts that could be selected right now for some model
    pub eligible_accounts: usize,
}

/// GET /health handler
///
/// Always 200 while the process serves HTTP; the counts show how much of the
/// pool is usable. Does not wait for discovery.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let models = state
        .registry()
        .try_snapshot()
        .map(|r| r.len())
        .unwrap_or(0);

    let response = HealthResponse {
        status: "OK".to_string(),
        models,
        accounts: state.pool().len(),
        eligible_accounts: state.pool().available_count().await,
    };

    (StatusCode::OK, Json(response))
}
