//! Campaign dispatch handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::call::Campaign;
use crate::campaign::DispatchLimits;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub lead_ids: Vec<Uuid>,
    pub max_concurrent_calls: usize,
    /// Minimum seconds between consecutive dispatches (>= 0)
    pub delay_between_calls_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct CreateCampaignResponse {
    pub campaign_id: Uuid,
}

/// `POST /v1/campaigns` — returns the campaign id immediately; dispatching
/// happens asynchronously.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCampaignRequest>,
) -> AppResult<Json<CreateCampaignResponse>> {
    if request.lead_ids.is_empty() {
        return Err(AppError::BadRequest("lead_ids must not be empty".to_string()));
    }
    if request.max_concurrent_calls == 0 {
        return Err(AppError::BadRequest(
            "max_concurrent_calls must be at least 1".to_string(),
        ));
    }
    if !request.delay_between_calls_secs.is_finite() || request.delay_between_calls_secs < 0.0 {
        return Err(AppError::BadRequest(
            "delay_between_calls_secs must be non-negative".to_string(),
        ));
    }

    let campaign = Campaign::new(request.lead_ids.len() as u32);
    let campaign_id = campaign.id;
    state.campaigns.insert(campaign).await;

    let limits = DispatchLimits::new(
        request.max_concurrent_calls,
        Duration::from_secs_f64(request.delay_between_calls_secs),
    );
    let controller = state.controller.clone();
    tokio::spawn(controller.dispatch(campaign_id, request.lead_ids, limits));

    Ok(Json(CreateCampaignResponse { campaign_id }))
}

/// `GET /v1/campaigns/{id}` — progress counters.
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Campaign>> {
    state
        .campaigns
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("campaign {id}")))
}
