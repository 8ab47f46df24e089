//! OpenAI Realtime API conversation engine.

mod client;
mod config;
mod messages;

pub use client::OpenAiConversationEngine;
pub use config::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};
