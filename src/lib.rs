pub mod audio;
pub mod call;
pub mod campaign;
pub mod config;
pub mod engine;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod relay;
pub mod routes;
pub mod state;
pub mod synth;
pub mod telephony;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use errors::{AppError, AppResult};
pub use state::AppState;
