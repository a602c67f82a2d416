//! # Relay Audio: virtual-cable playback and capture
//!
//! The audio half of the turn relay: find the virtual cable endpoints by name,
//! push a rendered TTS file into the cable's playback side, and capture the
//! remote agent's reply from the cable's capture side into a timestamped WAV.
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ decode (wav/ │ → │  resample    │ → │ gain + clip  │ → │ channel      │ → CABLE Input
//! │  symphonia)  │   │  (rubato)    │   │ [-1.0, 1.0]  │   │ reshape      │
//! └──────────────┘   └──────────────┘   └──────────────┘   └──────────────┘
//!
//! CABLE Output → capture (cpal) → AudioBuffer → {dir}/{prefix}_{YYYYMMDD}_{HHMMSS}.wav
//! ```

pub mod buffer;
pub mod chain;
pub mod decode;
pub mod device;
pub mod error;
pub mod meter;
pub mod playback;
pub mod recorder;
pub mod resample;
pub mod tone;

pub use buffer::AudioBuffer;
pub use chain::{run_chain_test, ChainOptions};
pub use decode::load_audio_file;
pub use device::{
    default_device_names, list_by_direction, list_devices, open_device, render_device_table, resolve,
    resolve_or_index, AudioDeviceDescriptor, Direction,
};
pub use error::{AudioError, AudioResult};
pub use meter::LevelMeter;
pub use playback::{play_buffer, play_file, prepare_for_device, PlaybackOptions};
pub use recorder::{recording_path, record, save_recording, write_wav, RecordOptions};
pub use resample::resample_best_effort;
pub use tone::{play_tone, sine_tone, ToneOptions, TONE_AMPLITUDE};
