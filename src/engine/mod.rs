//! Conversation engine providers.
//!
//! A conversation engine holds one persistent duplex connection per call,
//! configured at session start with call-specific context, and produces a
//! stream of transcript/text/audio events the media relay consumes.

mod base;
pub mod openai;

pub use base::{
    BaseConversationEngine, BoxedEngine, ConnectionState, EngineConfig, EngineError,
    EngineEvent, EngineEventCallback, EngineResult,
};
pub use openai::OpenAiConversationEngine;

/// Factory function to create a conversation engine provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI Realtime API over WebSocket
pub fn create_engine(provider: &str, config: EngineConfig) -> EngineResult<BoxedEngine> {
    match provider.to_lowercase().as_str() {
        "openai" => Ok(Box::new(OpenAiConversationEngine::new(config)?)),
        _ => Err(EngineError::InvalidConfiguration(format!(
            "Unsupported conversation engine provider: {provider}. Supported providers: openai"
        ))),
    }
}
