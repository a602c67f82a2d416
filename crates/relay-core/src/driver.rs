//! One relay turn: wait for listening → speak → wait for answering → record with feedback off.

use crate::error::{RelayError, RelayResult};
use async_trait::async_trait;
use relay_browser::{TurnDetector, TurnOutcome, TurnSignal, TurnState};
use relay_mixer::{CaptureRouting, ParameterBus};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How often turn waits re-check the shutdown flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Plays our side of the conversation into the cable.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self) -> RelayResult<()>;
}

/// Captures the agent's reply and persists it.
///
/// Must not return while capture is still running. Raising `stop` ends the
/// capture early; whatever was captured so far is kept.
#[async_trait]
pub trait Listener: Send + Sync {
    async fn record_reply(&self, stop: Arc<AtomicBool>) -> RelayResult<PathBuf>;
}

/// Mixer flag to hold off during capture.
pub struct FeedbackRoute<'a> {
    pub bus: &'a dyn ParameterBus,
    pub routing: CaptureRouting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub recording: PathBuf,
    pub listen_attempts: u32,
}

pub struct SessionDriver<'a> {
    pub speaker: &'a dyn Speaker,
    pub listener: &'a dyn Listener,
    pub signal: &'a dyn TurnSignal,
    /// Bounds each listening attempt.
    pub listen: TurnDetector,
    pub max_listen_attempts: u32,
    /// Bounds the wait for the agent to start answering.
    pub answer: TurnDetector,
    pub feedback: Option<FeedbackRoute<'a>>,
    /// Shutdown latch. Once raised, turns wind down and no new phase starts.
    pub stop: Arc<AtomicBool>,
}

impl<'a> SessionDriver<'a> {
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> RelayResult<()> {
        if self.is_stopped() {
            return Err(RelayError::Cancelled);
        }
        Ok(())
    }

    async fn until_stopped(&self) {
        while !self.is_stopped() {
            tokio::time::sleep(STOP_POLL).await;
        }
    }

    /// Turn wait that gives way to shutdown.
    async fn wait(&self, detector: &TurnDetector, state: TurnState) -> RelayResult<TurnOutcome> {
        tokio::select! {
            outcome = detector.wait_for(self.signal, state) => Ok(outcome),
            _ = self.until_stopped() => Err(RelayError::Cancelled),
        }
    }

    async fn await_listening(&self) -> RelayResult<u32> {
        let attempts = self.max_listen_attempts.max(1);
        for attempt in 1..=attempts {
            match self.wait(&self.listen, TurnState::Listening).await? {
                TurnOutcome::Reached => return Ok(attempt),
                TurnOutcome::TimedOut => {
                    warn!("⏳ Agent not listening yet (attempt {}/{})", attempt, attempts)
                }
            }
        }
        Err(RelayError::TurnTimeout {
            state: TurnState::Listening,
            waited: self.listen.timeout * attempts,
        })
    }

    /// Run one full turn. The feedback flag is restored before this returns, on every path.
    ///
    /// Dropping this future mid-recording would restore the flag while capture is
    /// still running; use [`SessionDriver::run_cycle_until`] to stop a turn instead.
    pub async fn run_cycle(&self) -> RelayResult<CycleReport> {
        self.ensure_running()?;
        let listen_attempts = self.await_listening().await?;

        self.ensure_running()?;
        info!("🗣️ Relaying TTS to the agent");
        self.speaker.speak().await?;

        self.ensure_running()?;
        if self.wait(&self.answer, TurnState::Answering).await? == TurnOutcome::TimedOut {
            return Err(RelayError::TurnTimeout {
                state: TurnState::Answering,
                waited: self.answer.timeout,
            });
        }

        let guard = match &self.feedback {
            Some(route) => Some(route.routing.engage(route.bus)?),
            None => None,
        };
        let recorded = self.listener.record_reply(Arc::clone(&self.stop)).await;
        drop(guard);

        let recording = recorded?;
        info!("✅ Turn complete: {}", recording.display());
        Ok(CycleReport {
            recording,
            listen_attempts,
        })
    }

    /// Run one turn, winding it down if `shutdown` resolves first.
    ///
    /// On shutdown the stop latch is raised and the turn is driven to completion:
    /// waits end with `Cancelled`, a running capture stops at its next tick, and
    /// the feedback flag comes back only after capture has returned.
    pub async fn run_cycle_until<F: Future>(&self, shutdown: F) -> RelayResult<CycleReport> {
        let cycle = self.run_cycle();
        tokio::pin!(cycle);
        tokio::pin!(shutdown);
        tokio::select! {
            result = &mut cycle => return result,
            _ = &mut shutdown => {}
        }
        info!("🛑 Stopping the current turn");
        self.stop.store(true, Ordering::SeqCst);
        cycle.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_audio::AudioError;
    use relay_browser::BrowserResult;
    use relay_mixer::{MemoryBus, ParamKey};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    struct FakeSpeaker(Log);

    #[async_trait]
    impl Speaker for FakeSpeaker {
        async fn speak(&self) -> RelayResult<()> {
            push(&self.0, "speak");
            Ok(())
        }
    }

    /// Records the feedback flag as seen during capture.
    struct FakeListener {
        log: Log,
        bus: Arc<MemoryBus>,
        fail: bool,
    }

    #[async_trait]
    impl Listener for FakeListener {
        async fn record_reply(&self, _stop: Arc<AtomicBool>) -> RelayResult<PathBuf> {
            let b1 = self.bus.get_float(&ParamKey::strip(0, "B1")).unwrap();
            push(&self.log, format!("record(B1={})", b1));
            if self.fail {
                return Err(AudioError::EmptyCapture.into());
            }
            Ok(PathBuf::from("recordings/reply.wav"))
        }
    }

    /// Always in the requested state, except Listening which it never reaches if `deaf`.
    struct FakeSignal {
        log: Log,
        deaf: bool,
    }

    #[async_trait]
    impl TurnSignal for FakeSignal {
        async fn probe(&self, state: TurnState) -> BrowserResult<bool> {
            push(&self.log, format!("probe({})", state));
            Ok(!(self.deaf && state == TurnState::Listening))
        }
    }

    /// Captures on the blocking pool like the cable listener, sampling the
    /// feedback flag every tick until stopped.
    struct BlockingListener {
        bus: Arc<MemoryBus>,
        seen: Arc<Mutex<Vec<f32>>>,
    }

    #[async_trait]
    impl Listener for BlockingListener {
        async fn record_reply(&self, stop: Arc<AtomicBool>) -> RelayResult<PathBuf> {
            let bus = Arc::clone(&self.bus);
            let seen = Arc::clone(&self.seen);
            tokio::task::spawn_blocking(move || {
                let deadline = std::time::Instant::now() + Duration::from_secs(5);
                while !stop.load(Ordering::SeqCst) && std::time::Instant::now() < deadline {
                    let b1 = bus.get_float(&ParamKey::strip(0, "B1")).unwrap();
                    seen.lock().unwrap().push(b1);
                    std::thread::sleep(Duration::from_millis(20));
                }
            })
            .await?;
            Ok(PathBuf::from("recordings/partial.wav"))
        }
    }

    fn fixture(fail: bool, deaf: bool) -> (Log, Arc<MemoryBus>, FakeSpeaker, FakeListener, FakeSignal) {
        let log: Log = Arc::default();
        let bus = Arc::new(MemoryBus::new().with_float("Strip[0].B1", 1.0));
        (
            log.clone(),
            bus.clone(),
            FakeSpeaker(log.clone()),
            FakeListener {
                log: log.clone(),
                bus,
                fail,
            },
            FakeSignal { log, deaf },
        )
    }

    fn driver<'a>(
        speaker: &'a FakeSpeaker,
        listener: &'a FakeListener,
        signal: &'a FakeSignal,
        bus: &'a MemoryBus,
    ) -> SessionDriver<'a> {
        SessionDriver {
            speaker,
            listener,
            signal,
            listen: TurnDetector::new(Duration::from_millis(100), Duration::from_secs(2)),
            max_listen_attempts: 3,
            answer: TurnDetector::new(Duration::from_millis(100), Duration::from_secs(2)),
            feedback: Some(FeedbackRoute {
                bus,
                routing: CaptureRouting::default(),
            }),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_runs_in_order_with_feedback_off_only_while_recording() {
        let (log, bus, speaker, listener, signal) = fixture(false, false);
        let report = driver(&speaker, &listener, &signal, &bus).run_cycle().await.unwrap();

        assert_eq!(report.recording, PathBuf::from("recordings/reply.wav"));
        assert_eq!(report.listen_attempts, 1);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["probe(listening)", "speak", "probe(answering)", "record(B1=0)"]
        );
        assert_eq!(bus.float("Strip[0].B1"), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_recording_still_restores_feedback() {
        let (_log, bus, speaker, listener, signal) = fixture(true, false);
        let err = driver(&speaker, &listener, &signal, &bus).run_cycle().await.unwrap_err();

        assert!(matches!(err, RelayError::Audio(AudioError::EmptyCapture)));
        assert_eq!(bus.float("Strip[0].B1"), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_all_listen_attempts() {
        let (log, bus, speaker, listener, signal) = fixture(false, true);
        let started = tokio::time::Instant::now();
        let err = driver(&speaker, &listener, &signal, &bus).run_cycle().await.unwrap_err();

        match err {
            RelayError::TurnTimeout { state, waited } => {
                assert_eq!(state, TurnState::Listening);
                assert_eq!(waited, Duration::from_secs(6));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(started.elapsed() >= Duration::from_secs(6));
        let log = log.lock().unwrap();
        assert!(!log.iter().any(|e| e == "speak"));
        // mixer untouched
        assert!(bus.writes().is_empty());
    }

    #[tokio::test]
    async fn shutdown_mid_recording_keeps_feedback_off_until_capture_ends() {
        let (_log, bus, speaker, _listener, signal) = fixture(false, false);
        let listener = BlockingListener {
            bus: Arc::clone(&bus),
            seen: Arc::default(),
        };
        let driver = SessionDriver {
            speaker: &speaker,
            listener: &listener,
            signal: &signal,
            listen: TurnDetector::new(Duration::from_millis(10), Duration::from_secs(2)),
            max_listen_attempts: 1,
            answer: TurnDetector::new(Duration::from_millis(10), Duration::from_secs(2)),
            feedback: Some(FeedbackRoute {
                bus: bus.as_ref(),
                routing: CaptureRouting::default(),
            }),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let started = std::time::Instant::now();
        let report = driver
            .run_cycle_until(tokio::time::sleep(Duration::from_millis(150)))
            .await
            .unwrap();

        assert!(driver.is_stopped());
        assert_eq!(report.recording, PathBuf::from("recordings/partial.wav"));
        assert!(started.elapsed() < Duration::from_secs(4), "capture ignored the stop latch");
        let seen = listener.seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|b1| *b1 == 0.0), "capture saw feedback on: {:?}", seen);
        assert_eq!(bus.float("Strip[0].B1"), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_while_waiting_cancels_before_speaking() {
        let (log, bus, speaker, listener, signal) = fixture(false, true);
        let d = driver(&speaker, &listener, &signal, &bus);
        let started = tokio::time::Instant::now();
        let err = d
            .run_cycle_until(tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!log.lock().unwrap().iter().any(|e| e == "speak"));
        assert!(bus.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_driver_starts_no_new_turn() {
        let (log, bus, speaker, listener, signal) = fixture(false, false);
        let d = driver(&speaker, &listener, &signal, &bus);
        d.stop.store(true, Ordering::SeqCst);

        assert!(matches!(d.run_cycle().await, Err(RelayError::Cancelled)));
        assert!(!log.lock().unwrap().iter().any(|e| e == "speak"));
    }
}
