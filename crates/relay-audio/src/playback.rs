//! Playback Relay: push a decoded TTS buffer into the virtual cable's playback side.
//!
//! Blocking by design: `play_buffer` returns only after the last frame has been
//! handed to the device (plus a short drain), so the caller can sequence
//! "play → wait for the agent's answer" without guessing at durations.

use crate::buffer::{rms, AudioBuffer};
use crate::decode::load_audio_file;
use crate::device::{open_device, AudioDeviceDescriptor, Direction};
use crate::error::{AudioError, AudioResult};
use crate::meter::LevelMeter;
use crate::resample::resample_best_effort;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extra wait after the last callback so the device buffer empties.
const DRAIN_DELAY: Duration = Duration::from_millis(250);
/// Grace period beyond the buffer duration before playback counts as stalled.
const STALL_GRACE: Duration = Duration::from_secs(5);
/// Meter refresh interval while monitoring.
const METER_TICK: Duration = Duration::from_millis(50);

/// How a file is prepared and played.
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Linear gain multiplier (1.0 = unchanged). Output is clipped to [-1, 1].
    pub gain: f32,
    /// Convert to the device's default rate before playing (best-effort).
    pub resample: bool,
    /// Render a live RMS meter on stderr.
    pub monitor: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            gain: 3.0,
            resample: true,
            monitor: false,
        }
    }
}

/// Decode, resample, gain/clip and reshape `path`, then play it on `device`.
pub fn play_file<P: AsRef<Path>>(
    path: P,
    device: &AudioDeviceDescriptor,
    options: &PlaybackOptions,
) -> AudioResult<()> {
    let buffer = load_audio_file(path)?;
    let prepared = prepare_for_device(buffer, device, options);
    play_buffer(&prepared, device, options.monitor)
}

/// Rate conversion → gain/clip → channel reshape, in that order.
pub fn prepare_for_device(
    mut buffer: AudioBuffer,
    device: &AudioDeviceDescriptor,
    options: &PlaybackOptions,
) -> AudioBuffer {
    if options.resample && device.default_sample_rate > 0 {
        buffer = resample_best_effort(buffer, device.default_sample_rate);
    }
    if options.gain != 1.0 {
        info!("🔊 Applying gain: {}x", options.gain);
    }
    buffer.apply_gain(options.gain);

    let max_channels = device.max_output_channels.max(1);
    if buffer.channels != max_channels {
        info!(
            "🎧 Reshaping {} -> {} channels",
            buffer.channels, max_channels
        );
        buffer.reshape_channels(max_channels);
    }
    info!(
        "🔄 Final audio format: {} channels, {} frames, {} Hz",
        buffer.channels,
        buffer.frames(),
        buffer.sample_rate
    );
    buffer
}

/// Latest callback RMS, shared with the monitoring thread as raw f32 bits.
#[derive(Default)]
struct PlaybackLevel(AtomicU32);

impl PlaybackLevel {
    fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Play an already-prepared buffer and block until it has been consumed.
pub fn play_buffer(
    buffer: &AudioBuffer,
    device: &AudioDeviceDescriptor,
    monitor: bool,
) -> AudioResult<()> {
    if buffer.is_empty() {
        warn!("Nothing to play (empty buffer)");
        return Ok(());
    }
    let handle = open_device(device, Direction::Output)?;
    let sample_format = handle.default_output_config()?.sample_format();
    let config = StreamConfig {
        channels: buffer.channels,
        sample_rate: cpal::SampleRate(buffer.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    debug!(?config, ?sample_format, "output stream config");

    let samples = Arc::new(buffer.samples.clone());
    let level = Arc::new(PlaybackLevel::default());
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let stream = match sample_format {
        SampleFormat::F32 => build_output_stream::<f32>(&handle, &config, samples, level.clone(), done_tx)?,
        SampleFormat::I16 => build_output_stream::<i16>(&handle, &config, samples, level.clone(), done_tx)?,
        SampleFormat::U16 => build_output_stream::<u16>(&handle, &config, samples, level.clone(), done_tx)?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    info!("▶️ Playing to device #{}: {}", device.index, device.name);
    stream.play()?;

    let deadline = Instant::now() + buffer.duration() + STALL_GRACE;
    let meter = LevelMeter::default();
    loop {
        match done_rx.recv_timeout(METER_TICK) {
            Ok(()) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if monitor {
                    meter.show(&[level.get()]);
                }
                if Instant::now() > deadline {
                    return Err(AudioError::Stream("playback stalled".to_string()));
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(AudioError::Stream("output stream closed early".to_string()));
            }
        }
    }
    std::thread::sleep(DRAIN_DELAY);
    if monitor {
        meter.finish();
    }
    drop(stream);
    info!("✅ Playback complete ({:.2}s)", buffer.duration().as_secs_f32());
    Ok(())
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Vec<f32>>,
    level: Arc<PlaybackLevel>,
    done_tx: mpsc::Sender<()>,
) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut pos = 0usize;
    let mut signalled = false;
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let end = (pos + data.len()).min(samples.len());
            let chunk = &samples[pos..end];
            for (out, s) in data
                .iter_mut()
                .zip(chunk.iter().copied().chain(std::iter::repeat(0.0)))
            {
                *out = T::from_sample(s);
            }
            level.set(rms(chunk));
            pos = end;
            if pos >= samples.len() && !signalled {
                signalled = true;
                let _ = done_tx.send(());
            }
        },
        move |err| warn!("Audio output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cable_input(channels: u16, rate: u32) -> AudioDeviceDescriptor {
        AudioDeviceDescriptor {
            index: 1,
            name: "CABLE Input (VB-Audio Virtual Cable)".to_string(),
            max_input_channels: 0,
            max_output_channels: channels,
            default_sample_rate: rate,
        }
    }

    #[test]
    fn prepare_applies_gain_then_upmixes() {
        let mono = AudioBuffer::new(vec![0.1, 0.5, -0.2], 1, 48_000);
        let options = PlaybackOptions {
            gain: 3.0,
            resample: true,
            monitor: false,
        };
        let out = prepare_for_device(mono, &cable_input(2, 48_000), &options);
        assert_eq!(out.channels, 2);
        assert_eq!(out.frames(), 3);
        assert!((out.samples[0] - 0.3).abs() < 1e-6);
        assert_eq!(out.samples[0], out.samples[1]);
        assert_eq!(out.samples[2], 1.0);
        assert!((out.samples[4] + 0.6).abs() < 1e-6);
    }

    #[test]
    fn prepare_skips_resampling_when_disabled() {
        let stereo = AudioBuffer::new(vec![0.1; 2 * 441], 2, 44_100);
        let options = PlaybackOptions {
            gain: 1.0,
            resample: false,
            monitor: false,
        };
        let out = prepare_for_device(stereo, &cable_input(2, 48_000), &options);
        assert_eq!(out.sample_rate, 44_100);
        assert_eq!(out.frames(), 441);
    }

    #[test]
    fn prepare_downmixes_to_device_maximum() {
        let quad = AudioBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 4, 48_000);
        let options = PlaybackOptions {
            gain: 1.0,
            resample: false,
            monitor: false,
        };
        let out = prepare_for_device(quad, &cable_input(2, 48_000), &options);
        assert_eq!(out.samples, vec![0.1, 0.2]);
    }
}
