use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

/// Liveness plus a database ping.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db.health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}
