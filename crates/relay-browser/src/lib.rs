//! relay-browser: the browser half of the turn relay.
//!
//! Drives Chromium over the DevTools protocol (`chromiumoxide`):
//! - launch with faked media permissions and grant microphone capture
//! - pre-authenticate from a Playwright-style `auth.json` cookie snapshot
//! - click through the service's entry sequence (locators come from config)
//! - observe the agent's turn through a `TurnSignal` and `TurnDetector`

pub mod auth;
pub mod error;
pub mod locator;
pub mod session;
pub mod stale;
pub mod turn;

pub use auth::{SameSite, StorageState, StoredCookie};
pub use error::{BrowserError, BrowserResult};
pub use locator::Locator;
pub use session::{BrowserSession, LaunchOptions, MEDIA_FLAGS};
pub use stale::kill_stale_browsers;
pub use turn::{DomTurnSignal, TurnDetector, TurnOutcome, TurnSignal, TurnState};
