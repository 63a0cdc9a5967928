//! Liveness probe

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::api::middleware::{ApiError, AppState};

/// GET /healthz
pub async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.pool.ping().await.map_err(|e| {
        tracing::warn!("Health check failed: {:#}", e);
        ApiError::service_unavailable("Database unavailable")
    })?;

    Ok(Json(json!({ "status": "ok" })))
}
