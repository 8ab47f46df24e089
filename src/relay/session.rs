//! Per-call relay session.
//!
//! Owns the lifetime of one streaming session: `Connecting -> Active ->
//! Closing -> Closed`. The pump loop multiplexes transport events, engine
//! events, and cancellation; a fault here terminates this session only.

use std::sync::Arc;

use base64::prelude::*;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::{
    AudioSource, FrameChunker, decode_mulaw_to_bytes, encode_mulaw, resample_linear,
    TELEPHONY_SAMPLE_RATE,
};
use crate::call::{CallEvent, CallLifecycle, InteractionStore, Speaker};
use crate::engine::{BaseConversationEngine, EngineEvent};
use crate::synth::{BaseSynthesizer, SynthEncoding};
use crate::telephony::{StreamCommand, StreamEvent};

use super::chunker::SentenceChunker;
use super::registry::SessionRegistry;

/// Capacity of the engine-event channel feeding the pump loop.
const ENGINE_CHANNEL_CAPACITY: usize = 256;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Waiting for the engine connection
    Connecting,
    /// Pumping audio in both directions
    Active,
    /// Tearing down: engine closing, buffers discarded
    Closing,
    /// Fully released and deregistered
    Closed,
}

/// Everything a session needs, handed over by the stream handler.
pub struct RelaySessionParams {
    pub call_id: Uuid,
    pub stream_sid: String,
    pub engine: Box<dyn BaseConversationEngine>,
    pub synthesizer: Arc<dyn BaseSynthesizer>,
    pub interactions: Arc<dyn InteractionStore>,
    pub lifecycle: Arc<CallLifecycle>,
    pub registry: Arc<SessionRegistry>,
    pub outbound: mpsc::Sender<StreamCommand>,
    pub cancel: CancellationToken,
    /// Outbound frame duration in milliseconds (usually 20)
    pub frame_ms: u32,
    /// When true, assistant text is synthesized to speech per sentence.
    /// When false the engine streams its own audio and text is only logged.
    pub synthesize_text: bool,
}

/// Why the pump loop ended.
enum SessionEnd {
    /// Transport stop event or transport connection gone
    TransportStopped,
    /// Cancelled from outside (terminal call state)
    Cancelled,
    /// Engine or synthesis pipeline failure
    EngineFailed,
}

pub struct RelaySession {
    call_id: Uuid,
    stream_sid: String,
    state: RelayState,
    engine: Box<dyn BaseConversationEngine>,
    synthesizer: Arc<dyn BaseSynthesizer>,
    interactions: Arc<dyn InteractionStore>,
    lifecycle: Arc<CallLifecycle>,
    registry: Arc<SessionRegistry>,
    outbound: mpsc::Sender<StreamCommand>,
    cancel: CancellationToken,
    frame_ms: u32,
    synthesize_text: bool,
    chunker: SentenceChunker,
    frame_chunker: FrameChunker,
}

impl RelaySession {
    pub fn new(params: RelaySessionParams) -> Self {
        // frame_ms is validated at config load; fall back to the wire
        // default rather than refusing to build the session.
        let frame_chunker = FrameChunker::new(params.frame_ms)
            .unwrap_or_else(|_| FrameChunker::new(20).expect("default frame duration is valid"));
        Self {
            call_id: params.call_id,
            stream_sid: params.stream_sid,
            state: RelayState::Connecting,
            engine: params.engine,
            synthesizer: params.synthesizer,
            interactions: params.interactions,
            lifecycle: params.lifecycle,
            registry: params.registry,
            outbound: params.outbound,
            cancel: params.cancel,
            frame_ms: params.frame_ms,
            synthesize_text: params.synthesize_text,
            chunker: SentenceChunker::default(),
            frame_chunker,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Consumes transport events from `transport_rx` until the transport
    /// stops, the engine fails, or the session is cancelled, then tears the
    /// session down deterministically.
    pub async fn run(mut self, mut transport_rx: mpsc::Receiver<StreamEvent>) {
        let (engine_tx, mut engine_rx) = mpsc::channel::<EngineEvent>(ENGINE_CHANNEL_CAPACITY);

        // Callback must be registered before connect so no early event is
        // lost.
        let tx = engine_tx.clone();
        if let Err(e) = self.engine.on_event(Arc::new(move |event| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(event).await;
            })
        })) {
            error!(call_id = %self.call_id, error = %e, "failed to register engine callback");
            self.fail_and_close().await;
            return;
        }

        if let Err(e) = self.engine.connect().await {
            error!(call_id = %self.call_id, error = %e, "engine connection failed");
            self.fail_and_close().await;
            return;
        }

        self.state = RelayState::Active;
        info!(call_id = %self.call_id, stream_sid = %self.stream_sid, "relay session active");

        // Outbound sales call: the agent speaks first.
        if let Err(e) = self.engine.create_response().await {
            warn!(call_id = %self.call_id, error = %e, "failed to request opening response");
        }

        let cancel = self.cancel.clone();
        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Cancelled,

                transport_event = transport_rx.recv() => match transport_event {
                    Some(event) => {
                        if let Some(end) = self.handle_transport_event(event).await {
                            break end;
                        }
                    }
                    None => break SessionEnd::TransportStopped,
                },

                engine_event = engine_rx.recv() => match engine_event {
                    Some(event) => {
                        if let Some(end) = self.handle_engine_event(event).await {
                            break end;
                        }
                    }
                    None => {
                        warn!(call_id = %self.call_id, "engine event stream ended unexpectedly");
                        break SessionEnd::EngineFailed;
                    }
                },
            }
        };

        match end {
            SessionEnd::TransportStopped => {
                info!(call_id = %self.call_id, "transport session stopped");
            }
            SessionEnd::Cancelled => {
                info!(call_id = %self.call_id, "relay session cancelled");
            }
            SessionEnd::EngineFailed => {
                // The call failed unless a terminal outcome was reached by
                // other means; the state machine sorts that out.
                self.lifecycle.apply(self.call_id, CallEvent::RelayFailed).await;
            }
        }

        self.close().await;
    }

    async fn fail_and_close(&mut self) {
        self.lifecycle.apply(self.call_id, CallEvent::RelayFailed).await;
        self.close().await;
    }

    /// `Closing -> Closed`: release the engine, discard partial buffers,
    /// deregister.
    async fn close(&mut self) {
        self.state = RelayState::Closing;

        let dropped_text = self.chunker.discard();
        if dropped_text > 0 {
            debug!(call_id = %self.call_id, bytes = dropped_text, "discarded buffered partial text");
        }
        let dropped_audio = self.frame_chunker.finish();
        if dropped_audio > 0 {
            debug!(call_id = %self.call_id, bytes = dropped_audio, "discarded trailing partial frame");
        }

        if let Err(e) = self.engine.disconnect().await {
            warn!(call_id = %self.call_id, error = %e, "engine disconnect failed");
        }

        self.registry.remove(self.call_id);
        self.state = RelayState::Closed;
        info!(call_id = %self.call_id, "relay session closed");
    }

    /// Handle one transport event; returns the session end reason when the
    /// event terminates the session.
    async fn handle_transport_event(&mut self, event: StreamEvent) -> Option<SessionEnd> {
        match event {
            StreamEvent::Start { .. } => {
                debug!(call_id = %self.call_id, "duplicate start event ignored");
                None
            }
            StreamEvent::Media { payload, .. } => self.handle_inbound_media(&payload).await,
            StreamEvent::Mark { name, .. } => {
                debug!(call_id = %self.call_id, mark = %name, "transport mark");
                None
            }
            StreamEvent::Stop { .. } => Some(SessionEnd::TransportStopped),
        }
    }

    /// Decode one inbound companded frame and forward it to the engine.
    async fn handle_inbound_media(&mut self, payload: &str) -> Option<SessionEnd> {
        let companded = match BASE64_STANDARD.decode(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Bad frame: skip it, keep the session alive.
                warn!(call_id = %self.call_id, error = %e, "dropping undecodable media frame");
                return None;
            }
        };

        let linear = decode_mulaw_to_bytes(&companded);
        if let Err(e) = self.engine.send_audio(linear).await {
            error!(call_id = %self.call_id, error = %e, "failed to forward audio to engine");
            return Some(SessionEnd::EngineFailed);
        }
        None
    }

    /// Handle one engine event; returns the session end reason when the
    /// event is fatal to this session.
    async fn handle_engine_event(&mut self, event: EngineEvent) -> Option<SessionEnd> {
        match event {
            EngineEvent::CustomerTranscript {
                text,
                confidence,
                is_final,
            } => {
                if is_final {
                    // Garbled transcriptions are persisted too, for audit;
                    // confidence travels with them.
                    self.interactions
                        .append(self.call_id, Speaker::Customer, text, None, confidence)
                        .await;
                }
                None
            }

            EngineEvent::AssistantTextDelta { delta } => {
                let sentences = self.chunker.push(&delta);
                for sentence in sentences {
                    if let Some(end) = self.speak(sentence).await {
                        return Some(end);
                    }
                }
                None
            }

            EngineEvent::AssistantAudioDelta { pcm16, sample_rate } => {
                self.relay_engine_audio(&pcm16, sample_rate).await
            }

            EngineEvent::TurnComplete => {
                if let Some(remainder) = self.chunker.flush()
                    && let Some(end) = self.speak(remainder).await
                {
                    return Some(end);
                }
                let dropped = self.frame_chunker.finish();
                if dropped > 0 {
                    debug!(call_id = %self.call_id, bytes = dropped, "partial frame dropped at turn boundary");
                }
                None
            }

            EngineEvent::EngineFailure { message } => {
                error!(call_id = %self.call_id, error = %message, "conversation engine failure");
                Some(SessionEnd::EngineFailed)
            }
        }
    }

    /// Record one complete AI utterance and, in text mode, synthesize and
    /// stream it back to the caller.
    ///
    /// The interaction is appended before synthesis so transcript order
    /// matches utterance order regardless of synthesis latency.
    async fn speak(&mut self, sentence: String) -> Option<SessionEnd> {
        self.interactions
            .append(self.call_id, Speaker::Ai, sentence.clone(), None, None)
            .await;

        if !self.synthesize_text {
            return None;
        }

        let audio = match self.synthesizer.synthesize(&sentence).await {
            Ok(audio) => audio,
            Err(e) => {
                // Skip this utterance; the conversation continues.
                warn!(call_id = %self.call_id, error = %e, "speech synthesis failed, skipping utterance");
                return None;
            }
        };

        let source = match audio.encoding {
            SynthEncoding::Wav => AudioSource::Wav(&audio.data),
            SynthEncoding::Pcm16 { sample_rate } => AudioSource::Pcm16 {
                data: &audio.data,
                sample_rate,
                channels: 1,
            },
        };

        let frames = match crate::audio::transcode_to_framed_mulaw(&source, self.frame_ms) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "transcoding failed, skipping utterance");
                return None;
            }
        };

        self.send_frames(frames).await
    }

    /// Resample a raw engine PCM delta to narrowband and stream it out.
    async fn relay_engine_audio(
        &mut self,
        pcm16: &Bytes,
        sample_rate: u32,
    ) -> Option<SessionEnd> {
        if self.synthesize_text {
            // Text mode synthesizes its own audio; engine audio is unused.
            debug!(call_id = %self.call_id, "ignoring engine audio delta in text mode");
            return None;
        }

        if pcm16.len() % 2 != 0 {
            warn!(call_id = %self.call_id, "dropping engine audio delta with odd byte count");
            return None;
        }
        let samples: Vec<i16> = pcm16
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let narrowband = match resample_linear(&samples, sample_rate, TELEPHONY_SAMPLE_RATE) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "dropping engine audio delta");
                return None;
            }
        };

        let encoded = encode_mulaw(&narrowband);
        let frames = self.frame_chunker.push(&encoded);
        self.send_frames(frames).await
    }

    /// Write frames to the transport, tagged with the session identifier.
    async fn send_frames(&mut self, frames: Vec<Bytes>) -> Option<SessionEnd> {
        for frame in frames {
            let command = StreamCommand::media(&self.stream_sid, &frame);
            if self.outbound.send(command).await.is_err() {
                // Transport writer is gone; nothing left to relay to.
                warn!(call_id = %self.call_id, "transport outbound channel closed");
                return Some(SessionEnd::TransportStopped);
            }
        }
        None
    }
}
