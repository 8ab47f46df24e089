//! Base trait and types for conversation engine providers.
//!
//! # Audio Format
//!
//! Engines consume and produce PCM 16-bit signed little-endian mono. The
//! relay transcodes between this and the transport's companded narrowband
//! encoding at both edges.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during conversation engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-reported error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a conversation engine session.
///
/// Built once per call; `instructions` carries the lead-specific
/// personalization context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// API key for authentication
    pub api_key: String,

    /// Model to use
    #[serde(default)]
    pub model: String,

    /// Voice for engine-side TTS output (audio modality only)
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions, personalized per lead
    #[serde(default)]
    pub instructions: Option<String>,

    /// Temperature for response generation
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Response modalities; `["text"]` for relay-side synthesis,
    /// `["text", "audio"]` for engine-side audio
    #[serde(default)]
    pub modalities: Option<Vec<String>>,

    /// Model used to transcribe inbound caller audio
    #[serde(default)]
    pub transcription_model: Option<String>,
}

impl EngineConfig {
    /// Whether the engine is expected to stream its own audio.
    pub fn wants_audio(&self) -> bool {
        self.modalities
            .as_ref()
            .is_some_and(|m| m.iter().any(|s| s == "audio"))
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state for engine providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected to the provider
    #[default]
    Disconnected,
    /// Currently connecting
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection failed
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event emitted by a conversation engine session.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Transcribed caller speech
    CustomerTranscript {
        text: String,
        /// Transcription confidence when the provider reports one
        confidence: Option<f32>,
        is_final: bool,
    },
    /// Incremental assistant response text
    AssistantTextDelta { delta: String },
    /// Incremental assistant audio (PCM 16-bit LE mono)
    AssistantAudioDelta { pcm16: Bytes, sample_rate: u32 },
    /// The assistant finished its response turn
    TurnComplete,
    /// The engine failed; the session cannot continue
    EngineFailure { message: String },
}

/// Callback type for engine events.
pub type EngineEventCallback =
    Arc<dyn Fn(EngineEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

// =============================================================================
// Base Trait
// =============================================================================

/// Base trait for conversation engine providers.
///
/// Register the event callback before calling `connect` so no early event
/// is lost.
#[async_trait]
pub trait BaseConversationEngine: Send + Sync {
    /// Connect and configure the session.
    async fn connect(&mut self) -> EngineResult<()>;

    /// Disconnect and release the session.
    async fn disconnect(&mut self) -> EngineResult<()>;

    /// Check if the provider is connected and ready.
    fn is_ready(&self) -> bool;

    /// Get the current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Send caller audio (PCM 16-bit LE mono) into the conversation.
    async fn send_audio(&mut self, audio: Bytes) -> EngineResult<()>;

    /// Inject a text message into the conversation.
    async fn send_text(&mut self, text: &str) -> EngineResult<()>;

    /// Ask the model to generate a response now.
    async fn create_response(&mut self) -> EngineResult<()>;

    /// Register the event callback.
    fn on_event(&mut self, callback: EngineEventCallback) -> EngineResult<()>;
}

/// Boxed trait object for engine providers.
pub type BoxedEngine = Box<dyn BaseConversationEngine>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.api_key.is_empty());
        assert!(config.voice.is_none());
        assert!(!config.wants_audio());
    }

    #[test]
    fn test_wants_audio() {
        let config = EngineConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            ..Default::default()
        };
        assert!(config.wants_audio());

        let text_only = EngineConfig {
            modalities: Some(vec!["text".to_string()]),
            ..Default::default()
        };
        assert!(!text_only.wants_audio());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::ConnectionFailed("timeout".to_string());
        assert!(err.to_string().contains("Connection failed"));
        assert_eq!(EngineError::NotConnected.to_string(), "Not connected");
    }
}
