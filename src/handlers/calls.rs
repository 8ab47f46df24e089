//! Single-call handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::call::{Call, CallEvent, Interaction};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::telephony::DialRequest;

#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub lead_id: Uuid,
}

/// `POST /v1/calls` — create one call and place the dial immediately.
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCallRequest>,
) -> AppResult<Json<Call>> {
    let Some(lead) = state.leads.get(request.lead_id).await else {
        return Err(AppError::NotFound(format!("lead {}", request.lead_id)));
    };

    let call = Call::new(lead.id, None);
    let call_id = call.id;
    state.calls.insert(call).await;

    let dial = DialRequest {
        call_id,
        to: lead.phone.clone(),
        from: state.config.caller_id.clone().unwrap_or_default(),
        stream_url: state.config.stream_url(),
        status_callback_url: state.config.status_callback_url(),
    };

    match state.dialer.dial(&dial).await {
        Ok(sid) => {
            if let Some(mut call) = state.calls.get(call_id).await {
                call.transport_session_id = Some(sid);
                state.calls.update(call).await;
            }
            info!(call_id = %call_id, to = %lead.phone, "call dialed");
        }
        Err(e) => {
            warn!(call_id = %call_id, error = %e, "dial failed");
            state.lifecycle.apply(call_id, CallEvent::TransportFailed).await;
            return Err(e.into());
        }
    }

    state
        .calls
        .get(call_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::Internal("call record vanished".to_string()))
}

/// `GET /v1/calls/{id}`
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Call>> {
    state
        .calls
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("call {id}")))
}

/// `GET /v1/calls/{id}/interactions`
pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Interaction>>> {
    if state.calls.get(id).await.is_none() {
        return Err(AppError::NotFound(format!("call {id}")));
    }
    Ok(Json(state.interactions.list(id).await))
}
