//! Media stream WebSocket handler.
//!
//! The telephony transport opens one WebSocket per live call. This handler
//! is a thin adapter between the socket and a [`RelaySession`]: a sender
//! task drains the session's outbound commands into the socket, and the
//! read loop parses inbound JSON into stream events. The session itself is
//! constructed lazily on the `start` event, which is the first thing the
//! transport sends.

use axum::{
    Extension,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call::{CallEvent, Lead};
use crate::engine::{EngineConfig, create_engine};
use crate::relay::{RelaySession, RelaySessionParams, SessionHandle};
use crate::middleware::ClientIp;
use crate::state::AppState;
use crate::telephony::{StreamCommand, StreamEvent};

/// Channel capacities sized for sustained 50 frames/sec audio.
const OUTBOUND_CHANNEL_CAPACITY: usize = 1024;
const TRANSPORT_CHANNEL_CAPACITY: usize = 256;

/// `GET /v1/streams` — WebSocket upgrade for one call's media stream.
pub async fn stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let ip = client_ip.map(|Extension(ClientIp(ip))| ip);
    ws.on_upgrade(move |socket| handle_stream_socket(socket, state, ip))
}

async fn handle_stream_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    client_ip: Option<std::net::IpAddr>,
) {
    info!("media stream connection established");

    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<StreamCommand>(OUTBOUND_CHANNEL_CAPACITY);

    // Sender task: session commands -> socket text frames.
    let sender_task = tokio::spawn(async move {
        while let Some(command) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&command) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize stream command");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    // Session plumbing, created on the start event.
    let mut transport_tx: Option<mpsc::Sender<StreamEvent>> = None;

    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "media stream socket error");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                let event: StreamEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "unparseable stream event, skipping");
                        continue;
                    }
                };

                if let Some(tx) = &transport_tx {
                    if tx.send(event).await.is_err() {
                        // Session ended; nothing more to relay.
                        break;
                    }
                } else if let StreamEvent::Start { stream_sid, call_id } = &event {
                    match start_session(&state, *call_id, stream_sid.clone(), outbound_tx.clone())
                        .await
                    {
                        Some(tx) => transport_tx = Some(tx),
                        None => break,
                    }
                } else {
                    debug!("stream event before start, ignoring");
                }
            }
            Message::Close(_) => {
                info!("media stream closed by transport");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Binary(_) => {
                debug!("ignoring unexpected binary frame on media stream");
            }
        }
    }

    // Dropping the transport sender moves the session to Closing.
    drop(transport_tx);
    drop(outbound_tx);
    sender_task.abort();

    if let Some(ip) = client_ip {
        state.release_connection(ip);
    }
    info!("media stream connection terminated");
}

/// Build and spawn the relay session for a started stream. Returns the
/// transport event sender, or `None` when the stream cannot be tied to a
/// live call.
async fn start_session(
    state: &Arc<AppState>,
    call_id: Uuid,
    stream_sid: String,
    outbound_tx: mpsc::Sender<StreamCommand>,
) -> Option<mpsc::Sender<StreamEvent>> {
    let Some(call) = state.calls.get(call_id).await else {
        warn!(call_id = %call_id, "stream start for unknown call");
        return None;
    };
    if call.status.is_terminal() {
        warn!(call_id = %call_id, "stream start for already-terminal call");
        return None;
    }

    let lead = state.leads.get(call.lead_id).await;
    let engine_config = build_engine_config(state, lead.as_ref());

    let engine = match create_engine(&state.config.engine_provider, engine_config) {
        Ok(engine) => engine,
        Err(e) => {
            warn!(call_id = %call_id, error = %e, "failed to create conversation engine");
            state.lifecycle.apply(call_id, CallEvent::RelayFailed).await;
            return None;
        }
    };

    let cancel = CancellationToken::new();
    state.registry.insert(SessionHandle {
        call_id,
        stream_sid: stream_sid.clone(),
        cancel: cancel.clone(),
        outbound: outbound_tx.clone(),
    });

    let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);

    let session = RelaySession::new(RelaySessionParams {
        call_id,
        stream_sid,
        engine,
        synthesizer: state.synthesizer.clone(),
        interactions: state.interactions.clone(),
        lifecycle: state.lifecycle.clone(),
        registry: state.registry.clone(),
        outbound: outbound_tx,
        cancel,
        frame_ms: state.config.frame_duration_ms,
        synthesize_text: !state.config.engine_wants_audio(),
    });

    tokio::spawn(session.run(transport_rx));
    info!(call_id = %call_id, "relay session started");
    Some(transport_tx)
}

/// Personalize the engine session with lead attributes.
fn build_engine_config(state: &Arc<AppState>, lead: Option<&Lead>) -> EngineConfig {
    let name = lead.map(|l| l.name.as_str()).unwrap_or("the customer");
    let company = lead
        .and_then(|l| l.company.as_deref())
        .unwrap_or("their company");

    let mut instructions = state
        .config
        .engine_instructions
        .replace("{name}", name)
        .replace("{company}", company);
    if let Some(notes) = lead.and_then(|l| l.notes.as_deref()) {
        instructions.push_str("\nBackground notes: ");
        instructions.push_str(notes);
    }

    EngineConfig {
        api_key: state.config.openai_api_key.clone().unwrap_or_default(),
        model: state.config.engine_model.clone(),
        voice: state.config.engine_voice.clone(),
        instructions: Some(instructions),
        temperature: None,
        modalities: Some(state.config.engine_modalities.clone()),
        transcription_model: state.config.engine_transcription_model.clone(),
    }
}
