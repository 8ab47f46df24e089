//! Source-audio decoding and outbound frame assembly.
//!
//! Synthesized speech arrives as a complete WAV or raw PCM buffer; the
//! transport wants exact fixed-size µ-law frames at 8 kHz. This module does
//! the full conversion in one pass for buffered sources, and incrementally
//! (via [`FrameChunker`]) for streamed engine audio deltas.

use std::io::Cursor;

use bytes::{Bytes, BytesMut};

use super::{
    AudioError, AudioResult, TELEPHONY_SAMPLE_RATE, downmix_to_mono, encode_mulaw,
    resample_linear,
};

/// A buffered audio source awaiting conversion to transport frames.
pub enum AudioSource<'a> {
    /// A complete WAV container (16-bit integer PCM only)
    Wav(&'a [u8]),
    /// Raw little-endian 16-bit PCM with a declared rate and channel count
    Pcm16 {
        data: &'a [u8],
        sample_rate: u32,
        channels: u16,
    },
}

/// Size in bytes of one µ-law frame of `frame_ms` milliseconds at 8 kHz.
///
/// 20 ms, the usual transport cadence, gives 160 bytes.
pub fn frame_bytes_for(frame_ms: u32) -> AudioResult<usize> {
    let bytes = (TELEPHONY_SAMPLE_RATE as u64 * frame_ms as u64 / 1000) as usize;
    if bytes == 0 {
        return Err(AudioError::InvalidFrameDuration(frame_ms));
    }
    Ok(bytes)
}

/// Convert a buffered source to a sequence of exact-size µ-law frames.
///
/// Pipeline: decode container -> downmix to mono -> resample to 8 kHz ->
/// µ-law encode -> split into `frame_bytes_for(frame_ms)` frames. A trailing
/// partial frame is discarded, not zero-padded: the transport requires exact
/// frame sizes, and callers needing exact total duration must pad the source
/// before conversion.
pub fn transcode_to_framed_mulaw(
    source: &AudioSource<'_>,
    frame_ms: u32,
) -> AudioResult<Vec<Bytes>> {
    let frame_bytes = frame_bytes_for(frame_ms)?;
    let (samples, sample_rate, channels) = decode_source(source)?;

    let mono = downmix_to_mono(&samples, channels);
    let narrowband = resample_linear(&mono, sample_rate, TELEPHONY_SAMPLE_RATE)?;
    let encoded = encode_mulaw(&narrowband);

    let mut frames = Vec::with_capacity(encoded.len() / frame_bytes);
    let mut offset = 0;
    while offset + frame_bytes <= encoded.len() {
        frames.push(encoded.slice(offset..offset + frame_bytes));
        offset += frame_bytes;
    }
    Ok(frames)
}

/// Decode a source into (samples, sample_rate, channels).
fn decode_source(source: &AudioSource<'_>) -> AudioResult<(Vec<i16>, u32, u16)> {
    match source {
        AudioSource::Wav(data) => {
            let reader = hound::WavReader::new(Cursor::new(*data))
                .map_err(|e| AudioError::MalformedInput(e.to_string()))?;
            let spec = reader.spec();

            if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{:?} {}-bit; expected 16-bit integer PCM",
                    spec.sample_format, spec.bits_per_sample
                )));
            }
            if spec.sample_rate == 0 {
                return Err(AudioError::UnsupportedRate(0));
            }

            let samples = reader
                .into_samples::<i16>()
                .collect::<Result<Vec<i16>, _>>()
                .map_err(|e| AudioError::MalformedInput(e.to_string()))?;
            Ok((samples, spec.sample_rate, spec.channels))
        }
        AudioSource::Pcm16 {
            data,
            sample_rate,
            channels,
        } => {
            if *sample_rate == 0 {
                return Err(AudioError::UnsupportedRate(0));
            }
            if *channels == 0 {
                return Err(AudioError::UnsupportedFormat("zero channels".to_string()));
            }
            // A trailing odd byte cannot form a sample; reject rather than
            // silently mis-frame everything after it.
            if data.len() % 2 != 0 {
                return Err(AudioError::MalformedInput(
                    "odd byte count for 16-bit PCM".to_string(),
                ));
            }
            let samples = data
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Ok((samples, *sample_rate, *channels))
        }
    }
}

/// Incremental frame assembler for streamed µ-law audio.
///
/// Engine audio deltas arrive in arbitrary sizes; this carries the
/// remainder between pushes so no bytes are lost mid-stream. Only the final
/// remainder at end-of-stream is discarded, by [`FrameChunker::finish`].
pub struct FrameChunker {
    frame_bytes: usize,
    buffer: BytesMut,
}

impl FrameChunker {
    /// Create a chunker emitting frames of `frame_ms` milliseconds.
    pub fn new(frame_ms: u32) -> AudioResult<Self> {
        Ok(Self {
            frame_bytes: frame_bytes_for(frame_ms)?,
            buffer: BytesMut::new(),
        })
    }

    /// Append µ-law bytes and drain all complete frames.
    pub fn push(&mut self, encoded: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(encoded);

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_bytes {
            frames.push(self.buffer.split_to(self.frame_bytes).freeze());
        }
        frames
    }

    /// End the stream, discarding any trailing partial frame.
    ///
    /// Returns the number of bytes discarded, for logging.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        dropped
    }

    /// Bytes currently buffered below one frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
