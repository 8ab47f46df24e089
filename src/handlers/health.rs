//! Health check handler.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::state::AppState;

/// Public health check: liveness plus a couple of gauge readings.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_sessions": state.registry.len(),
        "stream_connections": state.ws_connection_count(),
    }))
}
