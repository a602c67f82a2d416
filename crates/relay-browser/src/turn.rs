//! Turn detection: is the remote agent listening or answering?
//!
//! The page is probed through `TurnSignal`; `TurnDetector` turns that into a
//! bounded wait. Swapping the DOM probe for another mechanism doesn't touch
//! the session driver.

use crate::error::BrowserResult;
use crate::session::BrowserSession;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Agent idle, waiting for our audio.
    Listening,
    /// Agent speaking.
    Answering,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Listening => f.write_str("listening"),
            TurnState::Answering => f.write_str("answering"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Reached,
    TimedOut,
}

/// "Is the page in this state right now?"
#[async_trait]
pub trait TurnSignal: Send + Sync {
    async fn probe(&self, state: TurnState) -> BrowserResult<bool>;
}

/// Answering while the speaking indicator is present and visible, listening otherwise.
pub struct DomTurnSignal {
    session: Arc<BrowserSession>,
    indicator: String,
}

impl DomTurnSignal {
    pub fn new(session: Arc<BrowserSession>, indicator: impl Into<String>) -> Self {
        Self {
            session,
            indicator: indicator.into(),
        }
    }
}

/// JS expression: true when `selector` matches a rendered, visible element.
pub fn visibility_script(selector: &str) -> String {
    let quoted = serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         const s = window.getComputedStyle(el); const r = el.getBoundingClientRect(); \
         return s.display !== 'none' && s.visibility !== 'hidden' && s.opacity !== '0' \
         && r.width > 0 && r.height > 0; }})()",
        quoted
    )
}

#[async_trait]
impl TurnSignal for DomTurnSignal {
    async fn probe(&self, state: TurnState) -> BrowserResult<bool> {
        let speaking = self.session.eval_bool(visibility_script(&self.indicator)).await?;
        Ok(match state {
            TurnState::Answering => speaking,
            TurnState::Listening => !speaking,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TurnDetector {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for TurnDetector {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TurnDetector {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Poll `signal` until it reports `state` or the timeout elapses.
    /// Probe errors count as "not yet".
    pub async fn wait_for(&self, signal: &dyn TurnSignal, state: TurnState) -> TurnOutcome {
        let started = Instant::now();
        let poll = async {
            loop {
                match signal.probe(state).await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => warn!("Turn probe failed: {}", e),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(self.timeout, poll).await {
            Ok(()) => {
                info!("🔁 Agent is {} ({:.1}s)", state, started.elapsed().as_secs_f32());
                TurnOutcome::Reached
            }
            Err(_) => {
                debug!("gave up waiting for {} after {:?}", state, self.timeout);
                TurnOutcome::TimedOut
            }
        }
    }
}
