//! HTTP middleware: API authentication and WebSocket connection limits.

mod auth;
mod connection_limit;

pub use auth::{Auth, auth_middleware, match_api_secret_id};
pub use connection_limit::{ClientIp, connection_limit_middleware};
