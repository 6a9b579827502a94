//! System maintenance handlers.

use axum::{extract::State, Json};
use serde_json::json;

use crate::error::AppError;
use crate::startup::AppState;

/// Hard reset: removes the bill collection and retry queue from the durable
/// store outright. Irreversible, and this endpoint asks for no confirmation.
#[tracing::instrument(skip(state))]
pub async fn reset_system(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.reset_system().await?;
    state.retries.reset().await?;
    Ok(Json(json!({
        "success": true,
        "message": "System reset completed"
    })))
}
