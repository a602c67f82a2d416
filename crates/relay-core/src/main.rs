//! relay CLI: device diagnostics, mixer routing and the interactive relay session.
//!
//! Usage:
//!   relay                      # same as `relay session`
//!   relay list
//!   relay play graham.wav --device "CABLE Input" --gain 3.0
//!   relay record --device "CABLE Output" --duration 10
//!   relay tone --freq 440 --duration 3
//!   relay chain
//!   relay mixer apply --dry-run
//!   relay login

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_audio::{
    default_device_names, list_devices, play_file, play_tone, record, render_device_table,
    resolve_or_index, run_chain_test, save_recording, AudioDeviceDescriptor, ChainOptions,
    Direction, PlaybackOptions, RecordOptions, ToneOptions, TONE_AMPLITUDE,
};
use relay_core::{login, run_session, RelayConfig};
use relay_mixer::{MemoryBus, MixerSession, VoicemeeterRemote};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "relay", about = "Turn-synchronized audio relay for NotebookLM Interactive mode")]
struct Args {
    /// Config file (defaults to $RELAY_CONFIG or config/relay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging and full error chains
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List audio devices and highlight virtual cables
    List,
    /// Play an audio file to an output device
    Play {
        /// File to play (defaults to the configured TTS file)
        file: Option<PathBuf>,
        /// Device index or name substring
        #[arg(long)]
        device: Option<String>,
        #[arg(long)]
        gain: Option<f32>,
        #[arg(long)]
        monitor: bool,
        /// Play at the file's own rate
        #[arg(long)]
        no_resample: bool,
    },
    /// Record from an input device into the recordings directory
    Record {
        #[arg(long)]
        device: Option<String>,
        /// Seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        monitor: bool,
    },
    /// Play a sine tone
    Tone {
        #[arg(long, default_value_t = 440.0)]
        freq: f32,
        /// Seconds
        #[arg(long, default_value_t = 3)]
        duration: u64,
        #[arg(long)]
        device: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        gain: f32,
    },
    /// Record the capture side while playing into the playback side
    Chain {
        #[arg(long)]
        playback: Option<String>,
        #[arg(long)]
        recording: Option<String>,
        /// File to play (a 440 Hz tone when omitted)
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        gain: Option<f32>,
        /// Capture cap in seconds
        #[arg(long, default_value_t = 10)]
        duration: u64,
    },
    /// Play the TTS file, then record the reply
    Playrecord {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Recording length in seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Interactive relay session (default)
    Session {
        /// TTS file relayed on every turn
        #[arg(long)]
        tts: Option<PathBuf>,
    },
    /// Log in by hand and save the cookie snapshot
    Login,
    /// Inspect or apply the mixer route
    Mixer {
        #[command(subcommand)]
        action: MixerAction,
    },
}

#[derive(Subcommand, Debug)]
enum MixerAction {
    /// Print the current route
    Show,
    /// Apply the configured route and verify it
    Apply {
        /// Print the writes without loading the mixer
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn device(spec: &str, direction: Direction) -> Result<AudioDeviceDescriptor> {
    let devices = list_devices()?;
    let found = match resolve_or_index(&devices, spec, direction) {
        Ok(found) => found,
        Err(e) => {
            let (input, output) = default_device_names();
            eprintln!("{}", render_device_table(&devices, input.as_deref(), output.as_deref()));
            return Err(e.into());
        }
    };
    info!("🔊 Using {} device {}: {}", direction, found.index, found.name);
    Ok(found)
}

fn open_mixer_session(config: &RelayConfig) -> Result<MixerSession> {
    let remote = VoicemeeterRemote::load(&config.mixer.dll_path)?;
    Ok(MixerSession::open(remote, config.mixer.edition, config.mixer.ready_delay())?)
}

fn list() -> Result<()> {
    let devices = list_devices()?;
    let (input, output) = default_device_names();
    println!(
        "{}",
        render_device_table(&devices, input.as_deref(), output.as_deref())
    );
    Ok(())
}

fn play_then_record(config: &RelayConfig, file: PathBuf, duration: Duration) -> Result<PathBuf> {
    let out = device(&config.audio.output_device, Direction::Output)?;
    let options = PlaybackOptions {
        gain: config.audio.gain,
        resample: config.audio.resample,
        monitor: config.audio.monitor,
    };
    play_file(&file, &out, &options).with_context(|| format!("playing {}", file.display()))?;

    let input = device(&config.audio.input_device, Direction::Input)?;
    let buffer = record(&input, &RecordOptions::for_duration(duration))?;
    Ok(save_recording(&config.recording.dir, &config.recording.prefix, &buffer)?)
}

fn mixer(config: &RelayConfig, action: MixerAction) -> Result<()> {
    let route = &config.mixer.route;
    match action {
        MixerAction::Show => {
            let session = open_mixer_session(config)?;
            println!("{}", route.snapshot(&session)?);
            session.close()?;
        }
        MixerAction::Apply { dry_run: true } => {
            let bus = MemoryBus::new();
            route.apply(&bus)?;
            for write in bus.writes() {
                println!("{:?}", write);
            }
        }
        MixerAction::Apply { dry_run: false } => {
            let session = open_mixer_session(config)?;
            let report = route.apply_and_verify(&session)?;
            session.close()?;
            if !report.is_clean() {
                anyhow::bail!(
                    "route drift: {} mismatched, {} unreadable",
                    report.mismatches.len(),
                    report.unreadable.len()
                );
            }
        }
    }
    Ok(())
}

async fn run(args: Args, mut config: RelayConfig) -> Result<()> {
    let command = args.command.unwrap_or(Command::Session { tts: None });
    match command {
        Command::List => list(),
        Command::Play {
            file,
            device: spec,
            gain,
            monitor,
            no_resample,
        } => {
            let file = file.unwrap_or_else(|| config.audio.tts_file.clone());
            let out = device(spec.as_deref().unwrap_or(&config.audio.output_device), Direction::Output)?;
            let options = PlaybackOptions {
                gain: gain.unwrap_or(config.audio.gain),
                resample: !no_resample,
                monitor,
            };
            play_file(&file, &out, &options).with_context(|| format!("playing {}", file.display()))?;
            Ok(())
        }
        Command::Record {
            device: spec,
            duration,
            output,
            monitor,
        } => {
            let input = device(spec.as_deref().unwrap_or(&config.audio.input_device), Direction::Input)?;
            let options = RecordOptions {
                monitor,
                ..RecordOptions::for_duration(
                    duration.map(Duration::from_secs).unwrap_or(config.recording.duration()),
                )
            };
            let buffer = record(&input, &options)?;
            let dir = output.unwrap_or_else(|| config.recording.dir.clone());
            let path = save_recording(&dir, &config.recording.prefix, &buffer)?;
            info!("💾 Saved {}", path.display());
            Ok(())
        }
        Command::Tone {
            freq,
            duration,
            device: spec,
            gain,
        } => {
            let out = device(spec.as_deref().unwrap_or(&config.audio.output_device), Direction::Output)?;
            play_tone(
                &out,
                &ToneOptions {
                    frequency: freq,
                    duration: Duration::from_secs(duration),
                    amplitude: TONE_AMPLITUDE,
                    gain,
                },
            )?;
            Ok(())
        }
        Command::Chain {
            playback,
            recording,
            file,
            gain,
            duration,
        } => {
            let out = device(playback.as_deref().unwrap_or(&config.audio.output_device), Direction::Output)?;
            let input = device(recording.as_deref().unwrap_or(&config.audio.input_device), Direction::Input)?;
            let options = ChainOptions {
                file,
                gain: gain.unwrap_or(config.audio.gain),
                max_duration: Duration::from_secs(duration),
                ..ChainOptions::default()
            };
            let path = run_chain_test(&out, &input, &options)?;
            info!("💾 Chain capture saved to {}", path.display());
            Ok(())
        }
        Command::Playrecord { file, duration } => {
            let file = file.unwrap_or_else(|| config.audio.tts_file.clone());
            let duration = duration
                .map(Duration::from_secs)
                .unwrap_or(config.recording.duration());
            let path = tokio::task::spawn_blocking(move || play_then_record(&config, file, duration)).await??;
            info!("💾 Reply saved to {}", path.display());
            Ok(())
        }
        Command::Session { tts } => {
            if let Some(tts) = tts {
                config.audio.tts_file = tts;
            }
            run_session(&config, args.debug).await?;
            Ok(())
        }
        Command::Login => {
            login(&config).await?;
            info!("✅ Saved {}", config.service.auth_file.display());
            Ok(())
        }
        Command::Mixer { action } => mixer(&config, action),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.debug);

    let config = match &args.config {
        Some(path) => RelayConfig::load_from(path),
        None => RelayConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let debug = args.debug;
    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if debug => {
            error!("❌ {:?}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
