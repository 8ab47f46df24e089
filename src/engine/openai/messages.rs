//! OpenAI Realtime wire messages.
//!
//! Only the subset of the protocol the relay needs: session configuration,
//! audio append, text injection, response control, and the server events
//! that carry transcripts, response deltas, and errors. Unknown server
//! event types fail to parse and are skipped by the reader task.

use serde::{Deserialize, Serialize};

// =============================================================================
// Client events
// =============================================================================

/// Events sent to the provider.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded PCM 16-bit LE mono
        audio: String,
    },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate {},
}

/// Session configuration payload.
#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// A conversation item created by the client (text injection).
#[derive(Debug, Clone, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub part_type: String,
    pub text: String,
}

impl ConversationItem {
    pub fn user_text(text: &str) -> Self {
        Self {
            item_type: "message".to_string(),
            role: "user".to_string(),
            content: vec![ContentPart {
                part_type: "input_text".to_string(),
                text: text.to_string(),
            }],
        }
    }
}

// =============================================================================
// Server events
// =============================================================================

/// Events received from the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    #[serde(rename = "session.updated")]
    SessionUpdated {},

    #[serde(rename = "error")]
    Error { error: ErrorDetail },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        transcript: String,
    },

    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },

    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded PCM 16-bit LE mono at 24 kHz
        delta: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone {},
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    pub message: String,
}
