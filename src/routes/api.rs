//! Protected REST API routes.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{calls, campaigns, leads};
use crate::state::AppState;

/// Create the authenticated API router.
///
/// # Endpoints
///
/// - `POST /v1/leads`, `GET /v1/leads` — lead registration seam
/// - `POST /v1/calls` — dial one lead now
/// - `GET  /v1/calls/{id}`, `GET /v1/calls/{id}/interactions`
/// - `POST /v1/campaigns` — batch dispatch, returns the campaign id
/// - `GET  /v1/campaigns/{id}` — progress counters
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/leads", post(leads::create_lead).get(leads::list_leads))
        .route("/v1/calls", post(calls::create_call))
        .route("/v1/calls/{id}", get(calls::get_call))
        .route("/v1/calls/{id}/interactions", get(calls::list_interactions))
        .route("/v1/campaigns", post(campaigns::create_campaign))
        .route("/v1/campaigns/{id}", get(campaigns::get_campaign))
        .layer(TraceLayer::new_for_http())
}
