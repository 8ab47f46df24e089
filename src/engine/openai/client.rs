//! OpenAI Realtime API client.
//!
//! WebSocket client implementing [`BaseConversationEngine`]. A writer task
//! drains a channel of client events into the socket; a reader task parses
//! server events and dispatches them to the registered callback.
//!
//! Mid-call reconnection is deliberately not attempted: replaying session
//! state into a live telephone call is worse than failing the session, so a
//! dropped connection surfaces as `EngineEvent::EngineFailure` and the
//! relay tears the session down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, error, info, warn};

use crate::engine::base::{
    BaseConversationEngine, ConnectionState, EngineConfig, EngineError, EngineEvent,
    EngineEventCallback, EngineResult,
};

use super::config::{DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, realtime_url};
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ServerEvent, SessionConfig,
};

/// Capacity of the channel feeding the socket writer task.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Sample rate of the provider's PCM output stream.
const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// OpenAI Realtime conversation engine.
pub struct OpenAiConversationEngine {
    config: EngineConfig,
    model: String,
    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    intentional_disconnect: Arc<AtomicBool>,
    session_id: Arc<RwLock<Option<String>>>,
    ws_tx: Option<mpsc::Sender<ClientEvent>>,
    callback: Arc<Mutex<Option<EngineEventCallback>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl OpenAiConversationEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        if config.api_key.is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "missing API key".to_string(),
            ));
        }
        let model = if config.model.is_empty() {
            DEFAULT_REALTIME_MODEL.to_string()
        } else {
            config.model.clone()
        };
        Ok(Self {
            config,
            model,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(RwLock::new(None)),
            ws_tx: None,
            callback: Arc::new(Mutex::new(None)),
            tasks: Vec::new(),
        })
    }

    /// Get the provider session id, once created.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Build the initial session configuration from the engine config.
    fn build_session_config(&self) -> SessionConfig {
        let wants_audio = self.config.wants_audio();
        SessionConfig {
            modalities: self.config.modalities.clone().or_else(|| {
                Some(vec!["text".to_string()])
            }),
            instructions: self.config.instructions.clone(),
            voice: if wants_audio {
                self.config.voice.clone()
            } else {
                None
            },
            temperature: self.config.temperature,
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: if wants_audio {
                Some("pcm16".to_string())
            } else {
                None
            },
            input_audio_transcription: Some(InputAudioTranscription {
                model: self
                    .config
                    .transcription_model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            }),
        }
    }

    /// Push a client event to the writer task.
    async fn send_event(&self, event: ClientEvent) -> EngineResult<()> {
        let Some(tx) = self.ws_tx.as_ref() else {
            return Err(EngineError::NotConnected);
        };
        tx.send(event)
            .await
            .map_err(|_| EngineError::NotConnected)
    }

    /// Translate one server event and hand it to the callback.
    async fn dispatch(
        event: ServerEvent,
        callback: &Arc<Mutex<Option<EngineEventCallback>>>,
        session_id: &Arc<RwLock<Option<String>>>,
    ) {
        let engine_event = match event {
            ServerEvent::SessionCreated { session } => {
                info!(session_id = %session.id, "engine session created");
                *session_id.write().await = Some(session.id);
                return;
            }
            ServerEvent::SessionUpdated {} => {
                debug!("engine session updated");
                return;
            }
            ServerEvent::Error { error } => EngineEvent::EngineFailure {
                message: format!(
                    "{}: {}",
                    error.error_type.as_deref().unwrap_or("error"),
                    error.message
                ),
            },
            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                EngineEvent::CustomerTranscript {
                    text: transcript,
                    confidence: None,
                    is_final: true,
                }
            }
            ServerEvent::TextDelta { delta }
            | ServerEvent::AudioTranscriptDelta { delta } => {
                EngineEvent::AssistantTextDelta { delta }
            }
            ServerEvent::AudioDelta { delta } => match BASE64_STANDARD.decode(&delta) {
                Ok(audio) => EngineEvent::AssistantAudioDelta {
                    pcm16: Bytes::from(audio),
                    sample_rate: OUTPUT_SAMPLE_RATE,
                },
                Err(e) => {
                    error!(error = %e, "failed to decode engine audio delta");
                    return;
                }
            },
            ServerEvent::ResponseDone {} => EngineEvent::TurnComplete,
        };

        if let Some(cb) = callback.lock().await.as_ref() {
            cb(engine_event).await;
        }
    }
}

#[async_trait]
impl BaseConversationEngine for OpenAiConversationEngine {
    async fn connect(&mut self) -> EngineResult<()> {
        *self.state.write().await = ConnectionState::Connecting;

        let mut request = realtime_url(&self.model)
            .into_client_request()
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
                .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _) = match connect_async(request).await {
            Ok(connection) => connection,
            Err(e) => {
                *self.state.write().await = ConnectionState::Failed;
                return Err(EngineError::ConnectionFailed(e.to_string()));
            }
        };

        let (mut sink, mut stream) = ws_stream.split();
        let (ws_tx, mut ws_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);

        // Writer task: serialize client events into the socket.
        let writer = tokio::spawn(async move {
            while let Some(event) = ws_rx.recv().await {
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "failed to serialize engine client event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    warn!(error = %e, "engine socket write failed");
                    break;
                }
            }
            // Channel closed: best-effort socket close.
            let _ = sink.send(Message::Close(None)).await;
        });

        // Reader task: parse server events and dispatch to the callback.
        let callback = self.callback.clone();
        let session_id = self.session_id.clone();
        let connected = self.connected.clone();
        let state = self.state.clone();
        let intentional = self.intentional_disconnect.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                Self::dispatch(event, &callback, &session_id).await;
                            }
                            Err(_) => {
                                // Protocol events outside the relayed subset.
                                debug!("skipping unhandled engine event");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        if !intentional.load(Ordering::SeqCst)
                            && let Some(cb) = callback.lock().await.as_ref()
                        {
                            cb(EngineEvent::EngineFailure {
                                message: "engine closed the connection".to_string(),
                            })
                            .await;
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if !intentional.load(Ordering::SeqCst)
                            && let Some(cb) = callback.lock().await.as_ref()
                        {
                            cb(EngineEvent::EngineFailure {
                                message: format!("engine socket error: {e}"),
                            })
                            .await;
                        }
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            *state.write().await = ConnectionState::Disconnected;
        });

        self.tasks.push(writer);
        self.tasks.push(reader);
        self.ws_tx = Some(ws_tx);
        self.connected.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connected;

        // Configure the session before any audio flows.
        self.send_event(ClientEvent::SessionUpdate {
            session: self.build_session_config(),
        })
        .await?;

        info!(model = %self.model, "connected to OpenAI realtime engine");
        Ok(())
    }

    async fn disconnect(&mut self) -> EngineResult<()> {
        self.intentional_disconnect.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        // Dropping the sender ends the writer task, which closes the socket.
        self.ws_tx = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }

        *self.state.write().await = ConnectionState::Disconnected;
        debug!("engine disconnected");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn send_audio(&mut self, audio: Bytes) -> EngineResult<()> {
        if !self.is_ready() {
            return Err(EngineError::NotConnected);
        }
        self.send_event(ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(&audio),
        })
        .await
    }

    async fn send_text(&mut self, text: &str) -> EngineResult<()> {
        if !self.is_ready() {
            return Err(EngineError::NotConnected);
        }
        self.send_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
        })
        .await?;
        self.send_event(ClientEvent::ResponseCreate {}).await
    }

    async fn create_response(&mut self) -> EngineResult<()> {
        if !self.is_ready() {
            return Err(EngineError::NotConnected);
        }
        self.send_event(ClientEvent::ResponseCreate {}).await
    }

    fn on_event(&mut self, callback: EngineEventCallback) -> EngineResult<()> {
        let slot = self.callback.clone();
        // Callback registration happens before connect; a blocking lock
        // here would be wrong inside the runtime, so swap via try_lock.
        let mut guard = slot
            .try_lock()
            .map_err(|_| EngineError::ProviderError("callback slot busy".to_string()))?;
        *guard = Some(callback);
        Ok(())
    }
}

impl Drop for OpenAiConversationEngine {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
