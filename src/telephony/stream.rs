//! Duplex media stream messages.
//!
//! The transport holds one persistent WebSocket per live call and speaks
//! JSON text frames: `start` (carries the session identifier used to tag
//! all outbound frames), `media` (one base64-encoded companded audio
//! frame), `stop`, and `mark` for playback checkpoints. Outbound frames
//! echo the session identifier from `start`.

use base64::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound event on the media stream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Session opened. `stream_sid` tags every outbound frame; `call_id`
    /// ties the stream to the call record created at dial time.
    Start { stream_sid: String, call_id: Uuid },
    /// One inbound audio frame, base64-encoded µ-law
    Media {
        stream_sid: String,
        /// Base64 of 8-bit companded audio
        payload: String,
    },
    /// Playback checkpoint echo
    Mark { stream_sid: String, name: String },
    /// Session ended by the transport
    Stop { stream_sid: String },
}

/// Outbound command on the media stream connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamCommand {
    /// One outbound audio frame, base64-encoded µ-law
    Media { stream_sid: String, payload: String },
    /// Request a playback checkpoint
    Mark { stream_sid: String, name: String },
    /// Drop any audio the transport has buffered but not yet played
    Clear { stream_sid: String },
}

impl StreamCommand {
    /// Build an outbound media command from a raw companded frame.
    pub fn media(stream_sid: &str, frame: &[u8]) -> Self {
        StreamCommand::Media {
            stream_sid: stream_sid.to_string(),
            payload: BASE64_STANDARD.encode(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_event_parses() {
        let call_id = Uuid::new_v4();
        let json = format!(
            r#"{{"event":"start","stream_sid":"MS123","call_id":"{call_id}"}}"#
        );
        let event: StreamEvent = serde_json::from_str(&json).unwrap();
        match event {
            StreamEvent::Start {
                stream_sid,
                call_id: parsed,
            } => {
                assert_eq!(stream_sid, "MS123");
                assert_eq!(parsed, call_id);
            }
            other => panic!("expected start, got {other:?}"),
        }
    }

    #[test]
    fn test_media_event_roundtrip() {
        let event = StreamEvent::Media {
            stream_sid: "MS123".to_string(),
            payload: BASE64_STANDARD.encode([0xFFu8; 160]),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"media""#));
        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StreamEvent::Media { .. }));
    }

    #[test]
    fn test_media_command_encodes_payload() {
        let frame = [0x7Fu8; 160];
        let command = StreamCommand::media("MS999", &frame);
        match &command {
            StreamCommand::Media { stream_sid, payload } => {
                assert_eq!(stream_sid, "MS999");
                assert_eq!(BASE64_STANDARD.decode(payload).unwrap(), frame);
            }
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_an_error() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"event":"dtmf","digit":"1"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_stop_event_parses() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"event":"stop","stream_sid":"MS123"}"#).unwrap();
        assert!(matches!(event, StreamEvent::Stop { .. }));
    }
}
