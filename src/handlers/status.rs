//! Transport status callback handler.
//!
//! Unauthenticated at the HTTP layer (the transport cannot hold our API
//! secrets); instead each callback body is HMAC-signed when a status auth
//! token is configured. Duplicate and out-of-order callbacks are absorbed
//! by the state machine, so this endpoint always answers 204 for
//! well-formed requests.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::call::CallEvent;
use crate::state::AppState;
use crate::telephony::{StatusCallback, verify_signature};

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-dialcast-signature";

/// `POST /v1/calls/status`
pub async fn status_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(token) = &state.config.status_auth_token {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(token, &body, signature) {
            warn!("rejecting status callback with bad signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let callback: StatusCallback = match serde_json::from_slice(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(error = %e, "malformed status callback");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(
        call_id = %callback.call_id,
        status = ?callback.status,
        amd = ?callback.answering_machine,
        "status callback"
    );

    // Answering-machine detection is a side branch applied before the
    // status transition so the voicemail outcome is in place when the
    // terminal event lands.
    if callback.answering_machine == Some(true) {
        state
            .lifecycle
            .apply(callback.call_id, CallEvent::VoicemailDetected)
            .await;
    }

    if let Some(event) = callback.to_call_event() {
        state.lifecycle.apply(callback.call_id, event).await;
    }

    StatusCode::NO_CONTENT
}
