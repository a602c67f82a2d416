//! Error types for the audio relay

use crate::device::Direction;
use thiserror::Error;

/// Result type alias for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Errors that can occur while resolving devices, decoding, playing or capturing
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No {direction} device matching '{needle}'")]
    DeviceNotFound { needle: String, direction: Direction },

    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    #[error("Device #{index} changed since enumeration (expected '{expected}')")]
    DeviceShifted { index: usize, expected: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open audio stream: {0}")]
    StreamOpen(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Capture produced no samples")]
    EmptyCapture,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for AudioError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioError::DeviceEnumeration(err.to_string())
    }
}

impl From<cpal::DeviceNameError> for AudioError {
    fn from(err: cpal::DeviceNameError) -> Self {
        AudioError::DeviceEnumeration(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::StreamOpen(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamOpen(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::Stream(err.to_string())
    }
}
