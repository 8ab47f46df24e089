//! Base trait and types for speech synthesis providers.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during speech synthesis.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Request could not be sent
    #[error("Synthesis request failed: {0}")]
    RequestFailed(String),

    /// Provider rejected the request
    #[error("Synthesis rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Provider returned an unusable body
    #[error("Malformed synthesis response: {0}")]
    MalformedResponse(String),
}

/// Result type for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Configuration for a synthesis provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthConfig {
    /// API key for authentication
    pub api_key: String,

    /// Model to use
    #[serde(default)]
    pub model: String,

    /// Voice id
    #[serde(default)]
    pub voice: Option<String>,

    /// Speaking speed multiplier
    #[serde(default)]
    pub speed: Option<f32>,
}

/// Encoding of a synthesized audio buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthEncoding {
    /// Complete WAV container
    Wav,
    /// Raw PCM 16-bit LE mono at the given rate
    Pcm16 { sample_rate: u32 },
}

/// A complete synthesized utterance.
#[derive(Debug, Clone)]
pub struct SynthAudio {
    pub data: Bytes,
    pub encoding: SynthEncoding,
}

/// Base trait for synthesis providers.
///
/// One synchronous request per utterance, returning the whole buffer; no
/// streaming. Providers are cheap to share behind an `Arc`.
#[async_trait]
pub trait BaseSynthesizer: Send + Sync {
    /// Synthesize one utterance.
    async fn synthesize(&self, text: &str) -> SynthResult<SynthAudio>;

    /// Stable fingerprint of the voice configuration, used as the cache
    /// key prefix so configuration changes never serve stale audio.
    fn fingerprint(&self) -> String;
}

/// Shared trait object for synthesis providers.
pub type BoxedSynthesizer = Arc<dyn BaseSynthesizer>;
