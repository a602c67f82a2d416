//! Speaker/Listener backed by the virtual cable. Audio I/O blocks, so it runs on the blocking pool.

use crate::config::{AudioConfig, RecordingConfig};
use crate::driver::{Listener, Speaker};
use crate::error::RelayResult;
use async_trait::async_trait;
use relay_audio::{
    list_devices, play_file, record, render_device_table, resolve_or_index, save_recording,
    AudioDeviceDescriptor, Direction, PlaybackOptions, RecordOptions,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Devices are re-resolved on every call; indices can shift between enumerations.
fn resolve_device(spec: &str, direction: Direction) -> RelayResult<AudioDeviceDescriptor> {
    let devices = list_devices()?;
    resolve_or_index(&devices, spec, direction).map_err(|e| {
        warn!("{}", render_device_table(&devices, None, None));
        e.into()
    })
}

pub struct CableSpeaker {
    pub device: String,
    pub tts_file: PathBuf,
    pub options: PlaybackOptions,
}

impl CableSpeaker {
    pub fn from_config(audio: &AudioConfig) -> Self {
        Self {
            device: audio.output_device.clone(),
            tts_file: audio.tts_file.clone(),
            options: PlaybackOptions {
                gain: audio.gain,
                resample: audio.resample,
                monitor: audio.monitor,
            },
        }
    }
}

#[async_trait]
impl Speaker for CableSpeaker {
    async fn speak(&self) -> RelayResult<()> {
        let device = self.device.clone();
        let file = self.tts_file.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || -> RelayResult<()> {
            let device = resolve_device(&device, Direction::Output)?;
            play_file(&file, &device, &options)?;
            Ok(())
        })
        .await?
    }
}

pub struct CableListener {
    pub device: String,
    pub recording: RecordingConfig,
    pub monitor: bool,
}

impl CableListener {
    pub fn from_config(audio: &AudioConfig, recording: &RecordingConfig) -> Self {
        Self {
            device: audio.input_device.clone(),
            recording: recording.clone(),
            monitor: audio.monitor,
        }
    }
}

/// Raises the stop flag if dropped while armed, so an abandoned capture ends at its next tick.
struct StopOnDrop(Option<Arc<AtomicBool>>);

impl StopOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        if let Some(stop) = self.0.take() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Listener for CableListener {
    async fn record_reply(&self, stop: Arc<AtomicBool>) -> RelayResult<PathBuf> {
        let device = self.device.clone();
        let recording = self.recording.clone();
        let monitor = self.monitor;
        let abandon = StopOnDrop(Some(Arc::clone(&stop)));
        let saved = tokio::task::spawn_blocking(move || -> RelayResult<PathBuf> {
            let device = resolve_device(&device, Direction::Input)?;
            let options = RecordOptions {
                duration: recording.duration(),
                monitor,
                stop: Some(stop),
            };
            let buffer = record(&device, &options)?;
            Ok(save_recording(&recording.dir, &recording.prefix, &buffer)?)
        })
        .await;
        abandon.disarm();
        saved?
    }
}
