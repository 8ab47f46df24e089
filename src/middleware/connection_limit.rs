//! WebSocket connection limits.
//!
//! One media stream carries a live conversation-engine connection and
//! synthesis traffic, so the caps are enforced here, before the upgrade
//! handshake commits any of that. A global maximum bounds the process; a
//! per-IP cap keeps one misbehaving transport edge from consuming it.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode, header::UPGRADE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::warn;

use crate::state::{AppState, ConnectionLimitError};

/// Client address injected for the stream handler, which releases the slot
/// when the session ends.
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

fn is_websocket_upgrade(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

/// Enforce the global and per-IP media-stream connection caps.
///
/// Upgrade requests that would exceed a cap are refused before the
/// handshake: 503 at the global cap, 429 at the per-IP cap. Requests that
/// are not WebSocket upgrades pass through untouched.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !is_websocket_upgrade(&request) {
        return next.run(request).await;
    }

    let ip = addr.ip();
    if let Err(reason) = state.try_acquire_connection(ip) {
        return refuse(ip, reason);
    }

    // Slot held from here; the stream handler gives it back at session end.
    request.extensions_mut().insert(ClientIp(ip));
    next.run(request).await
}

fn refuse(ip: IpAddr, reason: ConnectionLimitError) -> Response {
    warn!(ip = %ip, ?reason, "refusing media stream connection");
    match reason {
        ConnectionLimitError::GlobalLimitReached => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Stream capacity exhausted, retry later.",
        )
            .into_response(),
        ConnectionLimitError::PerIpLimitReached => (
            StatusCode::TOO_MANY_REQUESTS,
            "Connection limit reached for this address.",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_upgrade(value: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/v1/streams");
        if let Some(value) = value {
            builder = builder.header(UPGRADE, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_upgrade_detection() {
        assert!(is_websocket_upgrade(&request_with_upgrade(Some("websocket"))));
        assert!(is_websocket_upgrade(&request_with_upgrade(Some("WebSocket"))));
        assert!(!is_websocket_upgrade(&request_with_upgrade(Some("h2c"))));
        assert!(!is_websocket_upgrade(&request_with_upgrade(None)));
    }

    #[test]
    fn test_refusal_status_codes() {
        let ip: IpAddr = std::net::Ipv4Addr::LOCALHOST.into();
        assert_eq!(
            refuse(ip, ConnectionLimitError::GlobalLimitReached).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            refuse(ip, ConnectionLimitError::PerIpLimitReached).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
