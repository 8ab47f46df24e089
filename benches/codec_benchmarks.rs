//! Benchmarks for the audio hot path: µ-law expansion/compression and
//! outbound frame assembly. These run per inbound frame on every live
//! call, so regressions here multiply across the whole fleet of sessions.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use dialcast::audio::{
    AudioSource, decode_mulaw_to_bytes, encode_mulaw, transcode_to_framed_mulaw,
};

fn bench_decode_frame(c: &mut Criterion) {
    // One 20 ms transport frame.
    let frame: Vec<u8> = (0..160u32).map(|i| (i % 256) as u8).collect();
    c.bench_function("mulaw_decode_160B_frame", |b| {
        b.iter(|| decode_mulaw_to_bytes(black_box(&frame)))
    });
}

fn bench_encode_second(c: &mut Criterion) {
    // One second of narrowband audio.
    let samples: Vec<i16> = (0..8000i32).map(|i| ((i * 37) % 32000 - 16000) as i16).collect();
    c.bench_function("mulaw_encode_1s", |b| b.iter(|| encode_mulaw(black_box(&samples))));
}

fn bench_transcode_utterance(c: &mut Criterion) {
    // A typical synthesized sentence: ~2 seconds of 24 kHz mono PCM.
    let mut pcm = Vec::with_capacity(48000 * 2);
    for i in 0..48000i32 {
        let sample = (((i * 7) % 24000 - 12000) * 2) as i16;
        pcm.extend_from_slice(&sample.to_le_bytes());
    }

    c.bench_function("transcode_2s_utterance_to_frames", |b| {
        b.iter(|| {
            let source = AudioSource::Pcm16 {
                data: black_box(&pcm),
                sample_rate: 24000,
                channels: 1,
            };
            transcode_to_framed_mulaw(&source, 20).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_decode_frame,
    bench_encode_second,
    bench_transcode_utterance
);
criterion_main!(benches);
