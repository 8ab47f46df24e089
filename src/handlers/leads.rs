//! Lead registration handlers.
//!
//! Lead management proper is an external collaborator; these two endpoints
//! are just its entry point into the core so calls and campaigns have
//! something to dial.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::call::Lead;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// `POST /v1/leads`
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateLeadRequest>,
) -> AppResult<Json<Lead>> {
    if request.phone.trim().is_empty() {
        return Err(AppError::BadRequest("phone is required".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let lead = Lead {
        id: Uuid::new_v4(),
        name: request.name,
        phone: request.phone,
        company: request.company,
        notes: request.notes,
    };
    state.leads.insert(lead.clone()).await;
    Ok(Json(lead))
}

/// `GET /v1/leads`
pub async fn list_leads(State(state): State<Arc<AppState>>) -> Json<Vec<Lead>> {
    Json(state.leads.list().await)
}
