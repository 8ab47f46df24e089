//! Webhook routes.
//!
//! No bearer auth here — the transport signs callback bodies instead; see
//! the status handler.

use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::status::status_callback;
use crate::state::AppState;

/// Create the webhook router.
///
/// # Endpoint
///
/// `POST /v1/calls/status` — transport status callbacks (signature-verified
/// when a status auth token is configured).
pub fn create_webhook_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/calls/status", post(status_callback))
        .layer(TraceLayer::new_for_http())
}
