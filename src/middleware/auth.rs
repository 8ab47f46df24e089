//! API secret authentication middleware.
//!
//! Protects the REST API with static bearer secrets. When auth is not
//! required, requests pass through with an anonymous context so handlers
//! can always read an `Auth` extension. The status-callback webhook is NOT
//! behind this middleware; it uses signature verification instead.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::AuthApiSecret;
use crate::state::AppState;

/// Authenticated context attached to each request.
#[derive(Clone, Debug)]
pub struct Auth {
    /// Id of the matched API secret; `None` when auth is disabled
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: String) -> Self {
        Self { id: Some(id) }
    }

    pub fn anonymous() -> Self {
        Self { id: None }
    }
}

/// Constant-time match of a presented token against configured secrets.
pub fn match_api_secret_id<'a>(token: &str, secrets: &'a [AuthApiSecret]) -> Option<&'a str> {
    let token_bytes = token.as_bytes();
    secrets
        .iter()
        .find(|entry| entry.secret.as_bytes().ct_eq(token_bytes).into())
        .map(|entry| entry.id.as_str())
}

/// Bearer-token authentication for the protected API routes.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.auth_required {
        request.extensions_mut().insert(Auth::anonymous());
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token.and_then(|t| match_api_secret_id(t, &state.config.auth_api_secrets)) {
        Some(id) => {
            request.extensions_mut().insert(Auth::new(id.to_string()));
            next.run(request).await
        }
        None => {
            warn!("rejecting API request with missing or invalid token");
            (StatusCode::UNAUTHORIZED, "Invalid or missing API token").into_response()
        }
    }
}
