//! Relay configuration: built-in defaults, optional TOML file, `RELAY__*` environment.

use relay_browser::Locator;
use relay_mixer::{CaptureRouting, Edition, MixerRoute};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file when `RELAY_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/relay.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub audio: AudioConfig,
    pub recording: RecordingConfig,
    pub service: ServiceConfig,
    pub browser: BrowserConfig,
    pub mixer: MixerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Substring (or index) of the cable's playback side.
    pub output_device: String,
    /// Substring (or index) of the cable's capture side.
    pub input_device: String,
    pub gain: f32,
    pub tts_file: PathBuf,
    pub resample: bool,
    pub monitor: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: "CABLE Input".to_string(),
            input_device: "CABLE Output".to_string(),
            gain: 3.0,
            tts_file: PathBuf::from("graham.wav"),
            resample: true,
            monitor: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub dir: PathBuf,
    pub prefix: String,
    pub duration_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("recordings"),
            prefix: "notebooklm_reply".to_string(),
            duration_secs: 60,
        }
    }
}

impl RecordingConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: String,
    /// Title of the notebook clicked first.
    pub notebook: String,
    /// Locators clicked after the notebook, in order.
    pub entry_steps: Vec<String>,
    pub step_timeout_secs: u64,
    /// CSS selector of the agent's "speaking" indicator.
    pub speaking_indicator: String,
    pub poll_interval_ms: u64,
    pub listen_timeout_secs: u64,
    pub max_listen_attempts: u32,
    pub answer_timeout_secs: u64,
    pub auth_file: PathBuf,
    pub error_screenshot: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: "https://notebooklm.google.com/".to_string(),
            notebook: "Dr. Farsight Podcast".to_string(),
            entry_steps: vec![
                "text=Interactive mode".to_string(),
                "aria=Play audio".to_string(),
                "button=Join".to_string(),
            ],
            step_timeout_secs: 30,
            speaking_indicator: "[class*='speaking']".to_string(),
            poll_interval_ms: 500,
            listen_timeout_secs: 30,
            max_listen_attempts: 3,
            answer_timeout_secs: 30,
            auth_file: PathBuf::from("auth.json"),
            error_screenshot: PathBuf::from("error_screenshot.png"),
        }
    }
}

impl ServiceConfig {
    /// Notebook title followed by the configured entry steps.
    pub fn entry_sequence(&self) -> Result<Vec<Locator>, String> {
        let mut steps = vec![Locator::Text(self.notebook.clone())];
        for raw in &self.entry_steps {
            steps.push(raw.parse().map_err(|e| format!("entry step '{}': {}", raw, e))?);
        }
        Ok(steps)
    }

    /// `scheme://host` of the service URL, for permission grants.
    pub fn origin(&self) -> String {
        match self.url.split_once("://") {
            Some((scheme, rest)) => {
                let host = rest.split('/').next().unwrap_or(rest);
                format!("{}://{}", scheme, host)
            }
            None => self.url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    /// Persistent profile used by `relay login`.
    pub profile_dir: PathBuf,
    pub kill_stale: bool,
    pub stale_process_names: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            profile_dir: PathBuf::from("browser-profile"),
            kill_stale: true,
            stale_process_names: vec!["chromium".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub enabled: bool,
    pub dll_path: PathBuf,
    pub edition: Edition,
    pub ready_delay_ms: u64,
    pub route: MixerRoute,
    /// Flag held off while a reply is recorded.
    pub feedback: CaptureRouting,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dll_path: PathBuf::from(r"C:\Program Files (x86)\VB\Voicemeeter\VoicemeeterRemote64.dll"),
            edition: Edition::Banana,
            ready_delay_ms: 2000,
            route: MixerRoute::default(),
            feedback: CaptureRouting::default(),
        }
    }
}

impl MixerConfig {
    pub fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }
}

impl RelayConfig {
    /// Load config. Precedence: env `RELAY__*` > file (`RELAY_CONFIG` or `config/relay.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        built.try_deserialize()
    }
}
