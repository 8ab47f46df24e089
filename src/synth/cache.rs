//! Synthesis response cache.
//!
//! Campaign calls repeat the same openers, objection handlers, and closers
//! across hundreds of leads; synthesizing each occurrence is wasted spend
//! and latency. This wrapper caches complete utterance buffers keyed by
//! xxh3(fingerprint | text), so a configuration change can never serve
//! audio rendered with an old voice.

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_128;

use super::base::{BaseSynthesizer, SynthAudio, SynthResult};

/// Default maximum number of cached utterances.
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

/// Caching wrapper around any synthesis provider.
pub struct CachedSynthesizer {
    inner: Arc<dyn BaseSynthesizer>,
    cache: Cache<String, SynthAudio>,
}

impl CachedSynthesizer {
    pub fn new(inner: Arc<dyn BaseSynthesizer>, capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity),
        }
    }

    fn cache_key(&self, text: &str) -> String {
        let hash = xxh3_128(format!("{}|{}", self.inner.fingerprint(), text).as_bytes());
        format!("{hash:032x}")
    }

    /// Number of utterances currently cached.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl BaseSynthesizer for CachedSynthesizer {
    async fn synthesize(&self, text: &str) -> SynthResult<SynthAudio> {
        let key = self.cache_key(text);

        if let Some(hit) = self.cache.get(&key).await {
            debug!(bytes = hit.data.len(), "synthesis cache hit");
            return Ok(hit);
        }

        // Errors are not cached: a transient provider failure should not
        // poison the utterance.
        let audio = self.inner.synthesize(text).await?;
        self.cache.insert(key, audio.clone()).await;
        Ok(audio)
    }

    fn fingerprint(&self) -> String {
        self.inner.fingerprint()
    }
}
