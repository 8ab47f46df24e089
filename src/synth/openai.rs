//! OpenAI speech synthesis provider.
//!
//! # API Reference
//!
//! - Endpoint: `POST https://api.openai.com/v1/audio/speech`
//! - Models: tts-1, tts-1-hd, gpt-4o-mini-tts
//! - Output here: WAV (24 kHz mono), decoded downstream by the transcoder
//! - Speed: 0.25 to 4.0

use async_trait::async_trait;
use serde_json::json;
use xxhash_rust::xxh3::xxh3_128;

use super::base::{
    BaseSynthesizer, SynthAudio, SynthConfig, SynthEncoding, SynthError, SynthResult,
};

/// OpenAI TTS API endpoint
pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Default model when the configuration does not name one.
const DEFAULT_MODEL: &str = "tts-1";

/// Default voice when the configuration does not name one.
const DEFAULT_VOICE: &str = "alloy";

/// OpenAI synthesis provider using the Audio Speech API.
pub struct OpenAiSynthesizer {
    client: reqwest::Client,
    config: SynthConfig,
    model: String,
    voice: String,
    speed: f32,
    endpoint: String,
    fingerprint: String,
}

impl OpenAiSynthesizer {
    pub fn new(config: SynthConfig) -> SynthResult<Self> {
        Self::with_endpoint(config, OPENAI_TTS_URL.to_string())
    }

    /// Construct against a non-default endpoint. Test seam.
    pub fn with_endpoint(config: SynthConfig, endpoint: String) -> SynthResult<Self> {
        let model = if config.model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            config.model.clone()
        };
        let voice = config
            .voice
            .clone()
            .unwrap_or_else(|| DEFAULT_VOICE.to_string());
        let speed = config.speed.unwrap_or(1.0).clamp(0.25, 4.0);

        let fingerprint = compute_fingerprint(&model, &voice, speed);

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            model,
            voice,
            speed,
            endpoint,
            fingerprint,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }
}

/// Hash of the audible configuration, for cache keying.
fn compute_fingerprint(model: &str, voice: &str, speed: f32) -> String {
    let key = format!("openai|{model}|{voice}|{speed:.3}");
    let hash = xxh3_128(key.as_bytes());
    format!("{hash:032x}")
}

#[async_trait]
impl BaseSynthesizer for OpenAiSynthesizer {
    async fn synthesize(&self, text: &str) -> SynthResult<SynthAudio> {
        let mut body = json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "wav",
        });
        if (self.speed - 1.0).abs() > 0.001 {
            body["speed"] = json!(self.speed);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SynthError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| SynthError::MalformedResponse(e.to_string()))?;
        if data.is_empty() {
            return Err(SynthError::MalformedResponse("empty audio body".to_string()));
        }

        Ok(SynthAudio {
            data,
            encoding: SynthEncoding::Wav,
        })
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }
}
