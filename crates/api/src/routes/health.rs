use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use common::{with_deadline, Timeframe};

use crate::{ApiError, AppState};

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/timeframes", get(list_timeframes))
}

/// Health check endpoint. Fails when the store does not answer in time.
async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    with_deadline("store read", state.timeouts.store_read, state.store.ping())
        .await
        .map_err(|e| ApiError::with_context("store unavailable", e))?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn list_timeframes() -> Json<Value> {
    Json(json!({ "timeframes": Timeframe::ALL.map(|t| t.as_str()) }))
}
