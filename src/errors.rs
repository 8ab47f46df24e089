//! Application-level error type for HTTP handlers.
//!
//! Domain errors (`AudioError`, `EngineError`, `SynthError`, `DialerError`)
//! live next to their modules; this type is the handler-facing surface that
//! maps them onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::telephony::DialerError;

/// Errors surfaced by the REST API.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Dial failed: {0}")]
    Dial(#[from] DialerError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for HTTP handlers.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Dial(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::NotFound("call".to_string()).into_response(),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::BadRequest("bad".to_string()).into_response(),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Unauthorized.into_response(), StatusCode::UNAUTHORIZED),
            (
                AppError::Internal("oops".to_string()).into_response(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (response, expected) in cases {
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_dialer_error_maps_to_bad_gateway() {
        let err: AppError = DialerError::RequestFailed("down".to_string()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
