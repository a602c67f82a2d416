//! Test tone generator. Verifies the cable path without a TTS file.

use crate::buffer::AudioBuffer;
use crate::device::AudioDeviceDescriptor;
use crate::error::AudioResult;
use crate::meter::progress_bar;
use crate::playback::play_buffer;
use std::f32::consts::TAU;
use std::io::Write;
use std::time::Duration;
use tracing::info;

/// Peak amplitude of generated tones before gain.
pub const TONE_AMPLITUDE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct ToneOptions {
    pub frequency: f32,
    pub duration: Duration,
    pub amplitude: f32,
    pub gain: f32,
}

impl Default for ToneOptions {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            duration: Duration::from_secs(3),
            amplitude: TONE_AMPLITUDE,
            gain: 1.0,
        }
    }
}

/// Sine wave with the same sample on every channel.
pub fn sine_tone(
    frequency: f32,
    duration: Duration,
    amplitude: f32,
    sample_rate: u32,
    channels: u16,
) -> AudioBuffer {
    let frames = (duration.as_secs_f64() * sample_rate as f64) as usize;
    let channels = channels.max(1);
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for n in 0..frames {
        let t = n as f32 / sample_rate as f32;
        let s = amplitude * (TAU * frequency * t).sin();
        samples.extend(std::iter::repeat(s).take(channels as usize));
    }
    AudioBuffer::new(samples, channels, sample_rate)
}

/// Play a tone on `device` at its default rate, drawing a per-second progress bar.
pub fn play_tone(device: &AudioDeviceDescriptor, options: &ToneOptions) -> AudioResult<()> {
    let rate = if device.default_sample_rate > 0 {
        device.default_sample_rate
    } else {
        48_000
    };
    let mut tone = sine_tone(
        options.frequency,
        options.duration,
        options.amplitude,
        rate,
        device.max_output_channels,
    );
    tone.apply_gain(options.gain);
    info!(
        "🎵 Playing {} Hz tone for {}s on #{}: {} (gain {}x)",
        options.frequency,
        options.duration.as_secs(),
        device.index,
        device.name,
        options.gain
    );

    let total = options.duration.as_secs().max(1);
    std::thread::scope(|scope| {
        let player = scope.spawn(|| play_buffer(&tone, device, false));
        let mut elapsed = 0;
        while !player.is_finished() {
            eprint!("\r{}", progress_bar(elapsed, total, 30));
            let _ = std::io::stderr().flush();
            std::thread::sleep(Duration::from_secs(1));
            elapsed += 1;
        }
        eprintln!("\r{}", progress_bar(total, total, 30));
        player
            .join()
            .unwrap_or_else(|_| Err(crate::AudioError::Stream("tone playback panicked".into())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_has_expected_shape() {
        let tone = sine_tone(440.0, Duration::from_millis(500), 0.5, 48_000, 2);
        assert_eq!(tone.channels, 2);
        assert_eq!(tone.frames(), 24_000);
        assert_eq!(tone.samples[0], 0.0);
        let peak = tone.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= 0.5 + 1e-6 && peak > 0.49);
        // sine RMS = A / sqrt(2)
        assert!((tone.rms() - 0.5 / 2f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn identical_channels() {
        let tone = sine_tone(1000.0, Duration::from_millis(10), 0.3, 8_000, 3);
        for frame in tone.samples.chunks(3) {
            assert_eq!(frame[0], frame[1]);
            assert_eq!(frame[1], frame[2]);
        }
    }
}
