//! Error type for the relay session

use relay_audio::AudioError;
use relay_browser::{BrowserError, TurnState};
use relay_mixer::MixerError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Mixer error: {0}")]
    Mixer(#[from] MixerError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Agent never reached {state} within {waited:?}")]
    TurnTimeout { state: TurnState, waited: Duration },

    #[error("Turn stopped by shutdown")]
    Cancelled,

    #[error("Login not confirmed: {0}")]
    LoginNotConfirmed(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for RelayError {
    fn from(err: tokio::task::JoinError) -> Self {
        RelayError::Task(err.to_string())
    }
}
