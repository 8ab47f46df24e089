//! Audio transcoding engine.
//!
//! Converts between the 8 kHz companded µ-law encoding used by the telephony
//! transport and the 16-bit linear PCM required by the conversation and
//! speech-synthesis services, and chunks outbound audio into fixed-duration
//! frames matching the transport's delivery cadence.
//!
//! Every function in this module is pure and deterministic: a failed
//! conversion fails that single call and nothing else. Retry and fallback
//! decisions belong to the media relay.

mod mulaw;
mod resample;
mod transcode;

pub use mulaw::{decode_mulaw, decode_mulaw_to_bytes, encode_mulaw};
pub use resample::{downmix_to_mono, resample_linear};
pub use transcode::{
    AudioSource, FrameChunker, frame_bytes_for, transcode_to_framed_mulaw,
};

use thiserror::Error;

/// Telephony narrowband sample rate (Hz). All transport audio is 8 kHz mono.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Errors raised by audio conversions.
///
/// These always fail a single conversion call; they never terminate a
/// session by themselves.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Input could not be parsed as the declared container/encoding
    #[error("Malformed audio input: {0}")]
    MalformedInput(String),

    /// The source format is valid but not supported by the pipeline
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// A sample rate of zero, or a rate the resampler cannot handle
    #[error("Unsupported sample rate: {0} Hz")]
    UnsupportedRate(u32),

    /// Frame duration that produces an empty frame
    #[error("Invalid frame duration: {0} ms")]
    InvalidFrameDuration(u32),
}

/// Result type for audio conversions.
pub type AudioResult<T> = Result<T, AudioError>;
