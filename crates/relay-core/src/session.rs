//! Interactive session: browser + mixer + cable, one relay turn per Enter press.
//!
//! Lifetime is controlled by Ctrl+C only. On any failure the browser stays open
//! (with a screenshot on disk) so a human can step in.

use crate::cable::{CableListener, CableSpeaker};
use crate::config::{MixerConfig, RelayConfig};
use crate::driver::{FeedbackRoute, SessionDriver};
use crate::error::{RelayError, RelayResult};
use relay_browser::{
    kill_stale_browsers, BrowserSession, DomTurnSignal, LaunchOptions, StorageState, TurnDetector,
};
use relay_mixer::{MixerSession, VoicemeeterRemote};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub fn launch_options(config: &RelayConfig, persistent_profile: bool) -> LaunchOptions {
    LaunchOptions {
        headless: config.browser.headless,
        user_data_dir: persistent_profile.then(|| config.browser.profile_dir.clone()),
        executable: config.browser.executable.clone(),
        extra_args: Vec::new(),
    }
}

/// Log in to the mixer and apply the configured route. `None` when disabled or unavailable.
pub fn open_mixer(config: &MixerConfig) -> Option<MixerSession> {
    if !config.enabled {
        info!("🎛️ Mixer control disabled");
        return None;
    }
    let opened = VoicemeeterRemote::load(&config.dll_path)
        .and_then(|remote| MixerSession::open(remote, config.edition, config.ready_delay()));
    match opened {
        Ok(session) => {
            if let Err(e) = config.route.apply_and_verify(&session) {
                warn!("⚠️ Mixer route not applied: {}", e);
            }
            Some(session)
        }
        Err(e) => {
            warn!("⚠️ Mixer unavailable ({}); continuing without feedback control", e);
            None
        }
    }
}

fn log_failure(err: &RelayError, debug: bool) {
    if debug {
        error!("❌ {:?}", err);
    } else {
        error!("❌ {}", err);
    }
}

async fn screenshot(browser: &BrowserSession, config: &RelayConfig) {
    if let Err(e) = browser.screenshot(&config.service.error_screenshot).await {
        warn!("Error taking screenshot: {}", e);
    }
}

/// Wait for the shutdown signal, reporting (not propagating) handler failures.
async fn idle_until_shutdown<F>(shutdown: Pin<&mut F>)
where
    F: Future<Output = std::io::Result<()>>,
{
    info!("🛑 Browser stays open. Press Ctrl+C to exit.");
    if let Err(e) = shutdown.await {
        warn!("Ctrl+C handler failed: {}", e);
    }
}

/// Join `task` even when `shutdown` fires first, so whatever it opened can be
/// released. The flag reports whether shutdown was requested.
async fn join_through_shutdown<T, F>(mut task: JoinHandle<T>, shutdown: Pin<&mut F>) -> RelayResult<(T, bool)>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = shutdown => {}
        joined = &mut task => return Ok((joined?, false)),
    }
    info!("🛑 Ctrl+C received; finishing startup step before shutting down");
    Ok((task.await?, true))
}

fn close_mixer(mixer: Option<MixerSession>) {
    if let Some(mixer) = mixer {
        if let Err(e) = mixer.close() {
            warn!("Mixer logout failed: {}", e);
        }
    }
}

/// Launch, authenticate and click into the service's interactive mode.
async fn enter_interactive_mode(browser: &BrowserSession, config: &RelayConfig) -> RelayResult<()> {
    let service = &config.service;
    browser.grant_microphone(&service.origin()).await?;
    if let Some(state) = StorageState::load(&service.auth_file)? {
        browser.load_auth(&state).await?;
    }
    browser.goto(&service.url).await?;
    let steps = service
        .entry_sequence()
        .map_err(|e| RelayError::Config(config::ConfigError::Message(e)))?;
    browser
        .click_sequence(&steps, Duration::from_secs(service.step_timeout_secs))
        .await?;
    info!("✅ Interactive mode ready");
    Ok(())
}

pub async fn run_session(config: &RelayConfig, debug: bool) -> RelayResult<()> {
    // One handler for the whole session. It is live from its first poll (the
    // mixer step below); later Ctrl+C presses latch until the next select.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if config.browser.kill_stale {
        kill_stale_browsers(&config.browser.stale_process_names);
    }
    std::fs::create_dir_all(&config.recording.dir).map_err(relay_audio::AudioError::from)?;

    let mixer_config = config.mixer.clone();
    let opening = tokio::task::spawn_blocking(move || open_mixer(&mixer_config));
    let (mixer, interrupted) = join_through_shutdown(opening, shutdown.as_mut()).await?;
    if interrupted {
        close_mixer(mixer);
        return Ok(());
    }

    let options = launch_options(config, false);
    let launched = tokio::select! {
        launched = BrowserSession::launch(&options) => Some(launched),
        _ = shutdown.as_mut() => None,
    };
    let browser = match launched {
        Some(Ok(browser)) => Arc::new(browser),
        Some(Err(e)) => {
            close_mixer(mixer);
            return Err(e.into());
        }
        None => {
            info!("🛑 Ctrl+C received during browser launch; shutting down");
            close_mixer(mixer);
            return Ok(());
        }
    };

    let setup = tokio::select! {
        setup = enter_interactive_mode(&browser, config) => Some(setup),
        _ = shutdown.as_mut() => None,
    };
    let outcome = match setup {
        None => {
            info!("🛑 Ctrl+C received during setup; shutting down");
            Ok(())
        }
        Some(Ok(())) => relay_turns(config, &browser, mixer.as_ref(), debug, shutdown.as_mut()).await,
        Some(Err(e)) => {
            log_failure(&e, debug);
            screenshot(&browser, config).await;
            idle_until_shutdown(shutdown.as_mut()).await;
            Err(e)
        }
    };

    close_mixer(mixer);
    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.close().await?,
        Err(_) => warn!("Browser still referenced at shutdown; leaving it to the OS"),
    }
    outcome
}

async fn relay_turns<F>(
    config: &RelayConfig,
    browser: &Arc<BrowserSession>,
    mixer: Option<&MixerSession>,
    debug: bool,
    mut shutdown: Pin<&mut F>,
) -> RelayResult<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    let service = &config.service;
    let poll = Duration::from_millis(service.poll_interval_ms);
    let speaker = CableSpeaker::from_config(&config.audio);
    let listener = CableListener::from_config(&config.audio, &config.recording);
    let signal = DomTurnSignal::new(Arc::clone(browser), service.speaking_indicator.clone());
    let driver = SessionDriver {
        speaker: &speaker,
        listener: &listener,
        signal: &signal,
        listen: TurnDetector::new(poll, Duration::from_secs(service.listen_timeout_secs)),
        max_listen_attempts: service.max_listen_attempts,
        answer: TurnDetector::new(poll, Duration::from_secs(service.answer_timeout_secs)),
        feedback: mixer.map(|m| FeedbackRoute {
            bus: m,
            routing: config.mixer.feedback,
        }),
        stop: Arc::new(AtomicBool::new(false)),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut turn = 0u32;
    loop {
        println!(
            "\n⏎  Press Enter to relay {} (Ctrl+C to quit)",
            config.audio.tts_file.display()
        );
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.as_mut() => {
                info!("🛑 Ctrl+C received; shutting down");
                return Ok(());
            }
        };
        match line {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                info!("stdin closed");
                idle_until_shutdown(shutdown.as_mut()).await;
                return Ok(());
            }
        }

        turn += 1;
        info!("🔄 Turn {}", turn);
        match driver.run_cycle_until(shutdown.as_mut()).await {
            Ok(report) => info!(
                "🎧 Reply saved to {} (listen attempts: {})",
                report.recording.display(),
                report.listen_attempts
            ),
            Err(RelayError::Cancelled) => {}
            Err(e) => {
                log_failure(&e, debug);
                if !driver.is_stopped() {
                    screenshot(browser, config).await;
                }
            }
        }
        if driver.is_stopped() {
            info!("🛑 Ctrl+C received mid-turn; shutting down");
            return Ok(());
        }
    }
}

/// Wait for the Enter press that confirms a manual login.
async fn await_confirmation<R>(reader: R) -> RelayResult<()>
where
    R: AsyncBufRead + Unpin,
{
    match reader.lines().next_line().await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(RelayError::LoginNotConfirmed("stdin closed".to_string())),
        Err(e) => Err(RelayError::LoginNotConfirmed(e.to_string())),
    }
}

/// Open the persistent profile, let the user log in by hand, then snapshot the cookies.
pub async fn login(config: &RelayConfig) -> RelayResult<()> {
    let browser = BrowserSession::launch(&launch_options(config, true)).await?;
    let visited = browser.goto(&config.service.url).await;
    if let Err(e) = visited {
        browser.close().await?;
        return Err(e.into());
    }

    println!("🛠  Log in manually in the browser and open the notebook.");
    println!("✅ Press Enter to save {}...", config.service.auth_file.display());
    if let Err(e) = await_confirmation(BufReader::new(tokio::io::stdin())).await {
        warn!("⚠️ {}; {} left unchanged", e, config.service.auth_file.display());
        browser.close().await?;
        return Err(e);
    }

    let saved = match browser.storage_state().await {
        Ok(state) => state.save(&config.service.auth_file),
        Err(e) => Err(e),
    };
    browser.close().await?;
    saved?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn only_login_uses_the_persistent_profile() {
        let mut config = RelayConfig::default();
        config.browser.headless = true;

        let session = launch_options(&config, false);
        assert!(session.headless);
        assert!(session.user_data_dir.is_none());

        let login = launch_options(&config, true);
        assert_eq!(login.user_data_dir, Some(PathBuf::from("browser-profile")));
    }

    #[test]
    fn disabled_mixer_is_never_loaded() {
        let mut config = MixerConfig::default();
        config.enabled = false;
        config.dll_path = PathBuf::from("/nonexistent/VoicemeeterRemote64.dll");
        assert!(open_mixer(&config).is_none());
    }

    #[test]
    fn missing_mixer_library_degrades_to_none() {
        let mut config = MixerConfig::default();
        config.dll_path = PathBuf::from("/nonexistent/VoicemeeterRemote64.dll");
        assert!(open_mixer(&config).is_none());
    }

    #[tokio::test]
    async fn startup_task_is_joined_even_after_ctrl_c() {
        let task = tokio::task::spawn_blocking(|| {
            std::thread::sleep(Duration::from_millis(100));
            42
        });
        let shutdown = std::future::ready(());
        tokio::pin!(shutdown);

        let (value, interrupted) = join_through_shutdown(task, shutdown.as_mut()).await.unwrap();
        assert_eq!(value, 42);
        assert!(interrupted);
    }

    #[tokio::test]
    async fn startup_task_without_ctrl_c_is_not_interrupted() {
        let task = tokio::task::spawn_blocking(|| 7);
        let shutdown = std::future::pending::<()>();
        tokio::pin!(shutdown);

        let (value, interrupted) = join_through_shutdown(task, shutdown.as_mut()).await.unwrap();
        assert_eq!(value, 7);
        assert!(!interrupted);
    }

    #[tokio::test]
    async fn enter_confirms_login() {
        assert!(await_confirmation(&b"\n"[..]).await.is_ok());
    }

    #[tokio::test]
    async fn closed_stdin_does_not_confirm_login() {
        let err = await_confirmation(&b""[..]).await.unwrap_err();
        assert!(matches!(err, RelayError::LoginNotConfirmed(_)));
    }
}
