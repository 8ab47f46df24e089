//! Speech synthesis providers.
//!
//! Synthesis is a synchronous request per completed AI sentence: utterance
//! text in, complete audio buffer out. The cache wrapper bounds repeat cost
//! for campaign-scale repetition of openers and closers.

mod base;
mod cache;
mod openai;

pub use base::{BaseSynthesizer, BoxedSynthesizer, SynthAudio, SynthConfig, SynthEncoding, SynthError, SynthResult};
pub use cache::CachedSynthesizer;
pub use openai::{OPENAI_TTS_URL, OpenAiSynthesizer};

use std::sync::Arc;

/// Factory function to create a synthesis provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI Audio Speech API (tts-1, tts-1-hd, gpt-4o-mini-tts)
pub fn create_synthesizer(
    provider: &str,
    config: SynthConfig,
) -> SynthResult<Arc<dyn BaseSynthesizer>> {
    match provider.to_lowercase().as_str() {
        "openai" => Ok(Arc::new(OpenAiSynthesizer::new(config)?)),
        _ => Err(SynthError::InvalidConfiguration(format!(
            "Unsupported synthesis provider: {provider}. Supported providers: openai"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_synthesizer() {
        let config = SynthConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        };
        assert!(create_synthesizer("openai", config).is_ok());
        assert!(create_synthesizer("invalid", SynthConfig::default()).is_err());
    }
}
