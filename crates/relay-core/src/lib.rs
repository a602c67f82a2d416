//! # Relay Core
//!
//! Ties the audio, mixer and browser crates into one turn-synchronized relay:
//! wait for the agent to listen, speak our TTS into the virtual cable, wait for
//! the agent to answer, then record the reply with the mixer's feedback route off.
//!
//! - [`config`]: layered `RelayConfig` (defaults, TOML, `RELAY__*` env)
//! - [`driver`]: the per-turn state machine behind `Speaker`/`Listener`/`TurnSignal`
//! - [`cable`]: `Speaker`/`Listener` backed by the virtual cable
//! - [`session`]: the interactive Ctrl+C-bounded session and `login`

pub mod cable;
pub mod config;
pub mod driver;
pub mod error;
pub mod session;

pub use cable::{CableListener, CableSpeaker};
pub use crate::config::{
    AudioConfig, BrowserConfig, MixerConfig, RecordingConfig, RelayConfig, ServiceConfig,
    DEFAULT_CONFIG_PATH,
};
pub use driver::{CycleReport, FeedbackRoute, Listener, SessionDriver, Speaker};
pub use error::{RelayError, RelayResult};
pub use session::{launch_options, login, open_mixer, run_session};
