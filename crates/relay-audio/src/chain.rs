//! End-to-end cable check: capture on one thread while playing on another.

use crate::buffer::AudioBuffer;
use crate::decode::load_audio_file;
use crate::device::AudioDeviceDescriptor;
use crate::error::{AudioError, AudioResult};
use crate::playback::{play_buffer, prepare_for_device, PlaybackOptions};
use crate::recorder::{record, recording_path, write_wav, RecordOptions};
use crate::tone::{sine_tone, TONE_AMPLITUDE};
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const LEAD_IN: Duration = Duration::from_secs(1);
const TAIL: Duration = Duration::from_secs(2);
/// Below this RMS the capture is reported as silent.
const SILENCE_RMS: f32 = 1e-4;

#[derive(Debug, Clone)]
pub struct ChainOptions {
    /// File to play; a generated 5 s 440 Hz tone when absent or missing.
    pub file: Option<PathBuf>,
    pub gain: f32,
    /// Capture cap; raised to cover lead-in, playback and tail when shorter.
    pub max_duration: Duration,
    pub output_dir: PathBuf,
    pub monitor: bool,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            file: None,
            gain: 3.0,
            max_duration: Duration::from_secs(10),
            output_dir: PathBuf::from("."),
            monitor: true,
        }
    }
}

fn chain_source(options: &ChainOptions) -> AudioResult<AudioBuffer> {
    match &options.file {
        Some(path) if path.exists() => load_audio_file(path),
        other => {
            if let Some(path) = other {
                warn!("⚠️ {} not found, using a generated tone", path.display());
            } else {
                info!("🎵 No file given, generating a test tone");
            }
            Ok(sine_tone(440.0, Duration::from_secs(5), TONE_AMPLITUDE, 44_100, 1))
        }
    }
}

/// Play `options.file` to `playback` while recording `recording`; returns the WAV path.
pub fn run_chain_test(
    playback: &AudioDeviceDescriptor,
    recording: &AudioDeviceDescriptor,
    options: &ChainOptions,
) -> AudioResult<PathBuf> {
    let source = chain_source(options)?;
    let prepared = prepare_for_device(
        source,
        playback,
        &PlaybackOptions {
            gain: options.gain,
            resample: true,
            monitor: false,
        },
    );

    let stop = Arc::new(AtomicBool::new(false));
    let record_options = RecordOptions {
        duration: options.max_duration.max(prepared.duration() + LEAD_IN + TAIL),
        monitor: options.monitor,
        stop: Some(Arc::clone(&stop)),
    };

    let captured = std::thread::scope(|scope| -> AudioResult<AudioBuffer> {
        let recorder = scope.spawn(|| record(recording, &record_options));

        std::thread::sleep(LEAD_IN);
        let played = play_buffer(&prepared, playback, false);
        if played.is_ok() {
            info!("⏳ Continuing to record...");
            std::thread::sleep(TAIL);
        }
        stop.store(true, Ordering::Relaxed);

        let captured = recorder
            .join()
            .map_err(|_| AudioError::Stream("capture thread panicked".to_string()))?;
        played?;
        captured
    })?;

    let level = captured.rms();
    if level < SILENCE_RMS {
        warn!("🔇 Chain capture is silent (RMS {:.5}); check the cable routing", level);
    } else {
        info!("📈 Chain capture RMS: {:.3}", level);
    }

    let path = recording_path(&options.output_dir, "chain_test", &Local::now());
    write_wav(&path, &captured)?;
    info!("✅ Test recording saved to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_tone() {
        let options = ChainOptions {
            file: Some(PathBuf::from("no/such/tts.wav")),
            ..Default::default()
        };
        let source = chain_source(&options).unwrap();
        assert_eq!(source.channels, 1);
        assert_eq!(source.sample_rate, 44_100);
        assert_eq!(source.frames(), 5 * 44_100);
    }
}
