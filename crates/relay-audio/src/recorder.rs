//! Recording Relay: capture the remote agent's reply from the virtual cable.
//!
//! Block-by-block capture into a shared buffer (the cpal callback appends, the
//! calling thread waits and optionally renders a level meter). Capture ends when
//! the duration elapses or the external stop flag is raised, whichever is first.

use crate::buffer::{rms, AudioBuffer};
use crate::device::{open_device, AudioDeviceDescriptor, Direction};
use crate::error::{AudioError, AudioResult};
use crate::meter::LevelMeter;
use chrono::{DateTime, Local, TimeZone};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Capture channel ceiling (virtual cables often expose 8+ channels).
const MAX_CAPTURE_CHANNELS: u16 = 2;
/// Poll interval for stop flag / meter while capturing.
const CAPTURE_TICK: Duration = Duration::from_millis(50);

/// How long to capture, and how to report progress.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub duration: Duration,
    pub monitor: bool,
    /// Raised externally to end the capture early.
    pub stop: Option<Arc<AtomicBool>>,
}

impl RecordOptions {
    pub fn for_duration(duration: Duration) -> Self {
        Self {
            duration,
            monitor: false,
            stop: None,
        }
    }
}

/// Shared capture state. Callback appends; caller drains once at the end.
struct CaptureBuffer {
    samples: Mutex<Vec<f32>>,
    level: AtomicU32,
    error: Mutex<Option<String>>,
}

impl CaptureBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(Vec::with_capacity(capacity)),
            level: AtomicU32::new(0),
            error: Mutex::new(None),
        }
    }

    fn push(&self, block: &[f32]) {
        if let Ok(mut g) = self.samples.lock() {
            g.extend_from_slice(block);
        }
        self.level.store(rms(block).to_bits(), Ordering::Relaxed);
    }

    fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    fn fail(&self, message: String) {
        if let Ok(mut g) = self.error.lock() {
            g.get_or_insert(message);
        }
    }

    fn take_error(&self) -> Option<String> {
        self.error.lock().ok().and_then(|mut g| g.take())
    }

    fn take_samples(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut g| std::mem::take(&mut *g))
            .unwrap_or_default()
    }
}

/// Capture from `device` at its default input rate with `min(2, max_input_channels)` channels.
pub fn record(device: &AudioDeviceDescriptor, options: &RecordOptions) -> AudioResult<AudioBuffer> {
    let handle = open_device(device, Direction::Input)?;
    let default_config = handle.default_input_config()?;
    let sample_rate = default_config.sample_rate().0;
    let sample_format = default_config.sample_format();
    let channels = device.max_input_channels.clamp(1, MAX_CAPTURE_CHANNELS);

    let config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };
    debug!(?config, ?sample_format, "input stream config");

    let max_samples = (options.duration.as_secs_f64() * sample_rate as f64) as usize * channels as usize;
    let capture = Arc::new(CaptureBuffer::new(max_samples));

    let stream = match sample_format {
        SampleFormat::F32 => build_input_stream::<f32>(&handle, &config, Arc::clone(&capture))?,
        SampleFormat::I16 => build_input_stream::<i16>(&handle, &config, Arc::clone(&capture))?,
        SampleFormat::U16 => build_input_stream::<u16>(&handle, &config, Arc::clone(&capture))?,
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    info!(
        "🎙️ Recording from device #{}: {} ({} Hz, {} ch, {}s)",
        device.index,
        device.name,
        sample_rate,
        channels,
        options.duration.as_secs()
    );
    stream.play()?;

    let started = Instant::now();
    let meter = LevelMeter::default();
    while started.elapsed() < options.duration {
        if options
            .stop
            .as_ref()
            .map(|s| s.load(Ordering::Relaxed))
            .unwrap_or(false)
        {
            info!("⏹️ Recording stopped after {:.1}s", started.elapsed().as_secs_f32());
            break;
        }
        if let Some(err) = capture.take_error() {
            return Err(AudioError::Stream(err));
        }
        if options.monitor {
            meter.show(&[capture.level()]);
        }
        std::thread::sleep(CAPTURE_TICK.min(options.duration.saturating_sub(started.elapsed())));
    }
    drop(stream);
    if options.monitor {
        meter.finish();
    }

    let mut samples = capture.take_samples();
    samples.truncate(max_samples);
    if samples.is_empty() {
        return Err(AudioError::EmptyCapture);
    }
    Ok(AudioBuffer::new(samples, channels, sample_rate))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    capture: Arc<CaptureBuffer>,
) -> AudioResult<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let on_error = Arc::clone(&capture);
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let block: Vec<f32> = data.iter().map(|&s| f32::from_sample_(s)).collect();
            capture.push(&block);
        },
        move |err| {
            warn!("Audio capture stream error: {}", err);
            on_error.fail(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

/// `{dir}/{prefix}_{YYYYMMDD}_{HHMMSS}.wav` for the given clock value.
pub fn recording_path<Tz>(dir: &Path, prefix: &str, now: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    dir.join(format!("{}_{}.wav", prefix, now.format("%Y%m%d_%H%M%S")))
}

/// Encode `buffer` as 16-bit PCM WAV at `path`, creating parent directories.
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> AudioResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in &buffer.samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write a finished capture to a new timestamped file and return its path.
pub fn save_recording(dir: &Path, prefix: &str, buffer: &AudioBuffer) -> AudioResult<PathBuf> {
    let path = recording_path(dir, prefix, &Local::now());
    write_wav(&path, buffer)?;
    info!(
        "✅ Audio saved to: {} ({:.1}s)",
        path.display(),
        buffer.duration().as_secs_f32()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn recording_path_uses_prefix_and_fixed_clock() {
        let now = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 2).single().unwrap();
        let path = recording_path(Path::new("recordings"), "notebooklm_reply", &now);
        assert_eq!(
            path,
            Path::new("recordings").join("notebooklm_reply_20250307_090502.wav")
        );

        let name = path.file_name().unwrap().to_str().unwrap();
        let stamp = name
            .strip_prefix("notebooklm_reply_")
            .and_then(|s| s.strip_suffix(".wav"))
            .unwrap();
        let digits: String = stamp.chars().filter(|c| c.is_ascii_digit()).collect();
        assert_eq!(digits.len(), 14);
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "_");
    }

    #[test]
    fn write_wav_creates_directory_and_pcm16_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reply.wav");
        let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.5], 2, 48_000);
        write_wav(&path, &buffer).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48_000);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16_383, -16_383, i16::MAX]);
    }
}
