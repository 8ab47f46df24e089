//! Sample-rate conversion and channel downmix.
//!
//! The synthesis and conversation services produce wideband PCM (22.05 kHz
//! or 24 kHz); the telephony transport only accepts 8 kHz mono. Narrowband
//! speech survives linear interpolation without audible artifacts, so the
//! pipeline uses a plain linear resampler rather than a windowed-sinc one.

use super::{AudioError, AudioResult};

/// Average interleaved multi-channel samples down to mono.
///
/// A single-channel input is returned unchanged. A trailing incomplete
/// sample group (length not divisible by `channels`) is dropped.
pub fn downmix_to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Resample mono PCM from `from_hz` to `to_hz` by linear interpolation.
///
/// Output length is `floor(input_len * to_hz / from_hz)`. Identical rates
/// return the input unchanged. Zero rates are rejected.
pub fn resample_linear(samples: &[i16], from_hz: u32, to_hz: u32) -> AudioResult<Vec<i16>> {
    if from_hz == 0 {
        return Err(AudioError::UnsupportedRate(from_hz));
    }
    if to_hz == 0 {
        return Err(AudioError::UnsupportedRate(to_hz));
    }
    if from_hz == to_hz || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;

        let a = samples[idx] as f64;
        let b = if idx + 1 < samples.len() {
            samples[idx + 1] as f64
        } else {
            a
        };

        out.push((a + (b - a) * frac).round() as i16);
    }

    Ok(out)
}
