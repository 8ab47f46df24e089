//! Scripted test doubles for the relay's external collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use dialcast::engine::{
    BaseConversationEngine, ConnectionState, EngineError, EngineEvent, EngineEventCallback,
    EngineResult,
};
use dialcast::synth::{BaseSynthesizer, SynthAudio, SynthEncoding, SynthResult};

/// Conversation engine that plays a scripted event sequence after connect
/// and can be told to fail on the Nth inbound audio frame.
pub struct MockEngine {
    script: Vec<(Duration, EngineEvent)>,
    /// 1-based frame index whose `send_audio` call returns an error
    fail_on_frame: Option<usize>,
    frames_received: Arc<AtomicUsize>,
    callback: Arc<parking_lot::Mutex<Option<EngineEventCallback>>>,
    connected: bool,
}

impl MockEngine {
    pub fn scripted(script: Vec<(Duration, EngineEvent)>) -> Self {
        Self {
            script,
            fail_on_frame: None,
            frames_received: Arc::new(AtomicUsize::new(0)),
            callback: Arc::new(parking_lot::Mutex::new(None)),
            connected: false,
        }
    }

    pub fn failing_on_frame(frame: usize) -> Self {
        let mut engine = Self::scripted(Vec::new());
        engine.fail_on_frame = Some(frame);
        engine
    }

    /// Counter handle for asserting how many frames reached the engine.
    pub fn frames_received_handle(&self) -> Arc<AtomicUsize> {
        self.frames_received.clone()
    }
}

#[async_trait]
impl BaseConversationEngine for MockEngine {
    async fn connect(&mut self) -> EngineResult<()> {
        self.connected = true;

        // Play the script in the background, the way a real provider's
        // reader task would deliver events.
        let script = std::mem::take(&mut self.script);
        let callback = self.callback.clone();
        tokio::spawn(async move {
            for (delay, event) in script {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let cb = callback.lock().clone();
                if let Some(cb) = cb {
                    cb(event).await;
                }
            }
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> EngineResult<()> {
        self.connected = false;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected
    }

    fn connection_state(&self) -> ConnectionState {
        if self.connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn send_audio(&mut self, _audio: Bytes) -> EngineResult<()> {
        let seen = self.frames_received.fetch_add(1, Ordering::SeqCst) + 1;
        if Some(seen) == self.fail_on_frame {
            return Err(EngineError::ProviderError(format!(
                "scripted failure on frame {seen}"
            )));
        }
        Ok(())
    }

    async fn send_text(&mut self, _text: &str) -> EngineResult<()> {
        Ok(())
    }

    async fn create_response(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn on_event(&mut self, callback: EngineEventCallback) -> EngineResult<()> {
        *self.callback.lock() = Some(callback);
        Ok(())
    }
}

/// Synthesizer returning a fixed narrowband WAV after an optional delay,
/// for exercising ordering under synthesis latency.
pub struct MockSynthesizer {
    pub delay: Duration,
    pub wav: Vec<u8>,
    pub calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new(delay: Duration, wav: Vec<u8>) -> Self {
        Self {
            delay,
            wav,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl BaseSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> SynthResult<SynthAudio> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(SynthAudio {
            data: Bytes::from(self.wav.clone()),
            encoding: SynthEncoding::Wav,
        })
    }

    fn fingerprint(&self) -> String {
        "mock".to_string()
    }
}
