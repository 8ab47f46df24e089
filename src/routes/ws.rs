//! Media stream WebSocket route configuration.

use axum::{Router, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::stream::stream_handler;
use crate::state::AppState;

/// Create the media stream router.
///
/// # Endpoint
///
/// `GET /v1/streams` — WebSocket upgrade for one call's duplex audio
/// stream.
///
/// # Protocol
///
/// After upgrade the transport sends JSON text frames:
/// 1. `start` with the stream session id and the call id
/// 2. `media` frames carrying base64 µ-law audio
/// 3. `stop` when the call ends
///
/// The server writes `media` frames (synthesized AI speech) tagged with the
/// same stream session id.
pub fn create_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/streams", get(stream_handler))
        .layer(TraceLayer::new_for_http())
}
