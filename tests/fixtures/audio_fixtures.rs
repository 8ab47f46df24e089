//! Audio test fixtures.
//!
//! Programmatically generated audio keeps test inputs reproducible with no
//! external file dependencies and precise control over characteristics.

#![allow(dead_code)]

use std::f32::consts::PI;
use std::io::Cursor;

/// Telephony narrowband sample rate.
pub const NARROWBAND_RATE: u32 = 8000;

/// Engine/synthesis wideband sample rate.
pub const WIDEBAND_RATE: u32 = 24000;

/// Generate silence (zeros).
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate a sine tone at `frequency` Hz with amplitude 0.0 - 1.0.
pub fn generate_sine_wave(
    duration_samples: usize,
    frequency: f32,
    sample_rate: u32,
    amplitude: f32,
) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (max_amplitude * (2.0 * PI * frequency * t).sin()) as i16
        })
        .collect()
}

/// Generate a speech-like signal: a low tone with a slow amplitude
/// envelope, enough structure to survive companding round trips visibly.
pub fn generate_speech_like(duration_samples: usize, sample_rate: u32) -> Vec<i16> {
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let envelope = (2.0 * PI * 3.0 * t).sin().abs();
            let carrier = (2.0 * PI * 220.0 * t).sin();
            (0.5 * envelope * carrier * i16::MAX as f32) as i16
        })
        .collect()
}

/// Convert samples to little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Build a complete in-memory WAV file (16-bit integer PCM).
pub fn wav_bytes(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav spec is valid");
        for &sample in samples {
            writer.write_sample(sample).expect("in-memory write");
        }
        writer.finalize().expect("in-memory finalize");
    }
    cursor.into_inner()
}

/// One 20 ms µ-law frame of silence (µ-law zero is 0xFF).
pub fn silence_mulaw_frame() -> Vec<u8> {
    vec![0xFFu8; 160]
}

/// Deterministic pseudo-random generator for jittered test timings.
pub struct TestRng {
    state: u64,
}

impl TestRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in `[low, high)`.
    pub fn next_in_range(&mut self, low: u64, high: u64) -> u64 {
        // Linear congruential generator; reproducible across runs.
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        low + (self.state >> 16) % (high - low)
    }
}
