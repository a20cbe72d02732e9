//! Runtime debug-logging toggle

use crate::error::AppError;
use crate::handlers::AppState;
use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    pub enable: Option<String>,
}

impl DebugQuery {
    /// Requested mode: only the exact value `true` enables debug logging
    pub fn requested(&self) -> Option<bool> {
        self.enable.as_deref().map(|v| v == "true")
    }
}

#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub debug_mode: bool,
}

/// GET /debug?enable=true|false
///
/// Without `enable` the current mode is reported unchanged; any value other
/// than `true` switches debug logging off.
pub async fn handler(
    State(state): State<AppState>,
    Query(query): Query<DebugQuery>,
) -> Result<Json<DebugResponse>, AppError> {
    let logs = state.log_control();

    if let Some(enable) = query.requested() {
        logs.set_debug(enable)
            .map_err(|e| AppError::Internal(format!("Failed to change log level: {}", e)))?;
    }

    Ok(Json(DebugResponse {
        debug_mode: logs.is_debug(),
    }))
}
