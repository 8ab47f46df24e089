//! OpenAI Realtime endpoint constants and defaults.

/// WebSocket endpoint; the model is appended as a query parameter.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model used when the configuration does not name one.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Transcription model used for inbound caller audio when none is
/// configured.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Build the connection URL for a model.
pub fn realtime_url(model: &str) -> String {
    format!("{OPENAI_REALTIME_URL}?model={model}")
}
