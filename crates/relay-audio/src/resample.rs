//! Best-effort sample-rate conversion with rubato.
//!
//! A failed conversion is not fatal: the caller keeps the native-rate buffer and
//! plays it anyway. A rate mismatch is audible as pitch/speed distortion, so the
//! fallback is always logged.

use crate::buffer::AudioBuffer;
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, warn};

/// Input frames per resampler chunk.
const CHUNK_FRAMES: usize = 1024;

/// Convert `buffer` to `target_rate`; returns the input unchanged on failure.
pub fn resample_best_effort(buffer: AudioBuffer, target_rate: u32) -> AudioBuffer {
    if target_rate == 0 || buffer.sample_rate == target_rate || buffer.is_empty() {
        return buffer;
    }
    match resample(&buffer, target_rate) {
        Ok(out) => {
            debug!(
                "Resampled {} Hz -> {} Hz ({} -> {} frames)",
                buffer.sample_rate,
                target_rate,
                buffer.frames(),
                out.frames()
            );
            out
        }
        Err(e) => {
            warn!(
                "⚠️ Resampling {} Hz -> {} Hz failed ({}); playing at native rate",
                buffer.sample_rate, target_rate, e
            );
            buffer
        }
    }
}

fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, String> {
    let channels = buffer.channels as usize;
    let frames = buffer.frames();
    let mut resampler = FftFixedIn::<f32>::new(
        buffer.sample_rate as usize,
        target_rate as usize,
        CHUNK_FRAMES,
        2,
        channels,
    )
    .map_err(|e| e.to_string())?;

    let planar: Vec<Vec<f32>> = (0..channels).map(|c| buffer.channel(c)).collect();
    let mut out: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let delay = resampler.output_delay();
    let expected = (frames as u64 * target_rate as u64 / buffer.sample_rate as u64) as usize;

    let mut pos = 0;
    // Keep feeding (zero-padded past the end) until the delayed tail is out.
    while pos < frames || out[0].len() < delay + expected {
        let need = resampler.input_frames_next();
        let end = (pos + need).min(frames);
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|ch| {
                let mut v = if pos < end { ch[pos..end].to_vec() } else { Vec::new() };
                v.resize(need, 0.0);
                v
            })
            .collect();
        let processed = resampler.process(&chunk, None).map_err(|e| e.to_string())?;
        for (o, p) in out.iter_mut().zip(processed) {
            o.extend(p);
        }
        pos = end.max(pos + need);
    }

    let mut samples = Vec::with_capacity(expected * channels);
    for i in delay..delay + expected {
        for ch in &out {
            samples.push(ch[i]);
        }
    }
    Ok(AudioBuffer::new(samples, buffer.channels, target_rate))
}
