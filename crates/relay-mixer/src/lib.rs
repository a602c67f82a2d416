//! relay-mixer: Voicemeeter routing for the turn relay.
//!
//! Loads `VoicemeeterRemote64.dll` via `libloading` and drives it through a
//! narrow `ParameterBus` capability.
//!
//! ## Lifecycle
//!
//! - `MixerSession::open` logs in, starts the mixer application when login
//!   reports it isn't running, and waits a fixed ready delay.
//! - Dropping the session logs out, on every exit path.
//!
//! ## Routing
//!
//! `MixerRoute` is the typed view of the only route this relay needs: the
//! capture cable on one strip, the playback cable on one bus. `apply` writes
//! every field; `verify` reads them back and reports drift as warnings.
//! `CaptureRouting::engage` returns a `FeedbackGuard` that holds the strip's
//! feedback flag off for the duration of a recording.

mod bus;
mod error;
mod guard;
mod key;
mod remote;
mod route;
mod session;

pub use bus::{BusWrite, MemoryBus, ParameterBus};
pub use error::{check_status, MixerError, MixerResult};
pub use guard::{CaptureRouting, FeedbackGuard};
pub use key::{OutputBus, ParamKey, Target};
pub use remote::{Edition, LoginStatus, RemoteControl, VoicemeeterRemote};
pub use route::{ApplyReport, Mismatch, MixerRoute, OutputFlags, RouteSnapshot};
pub use session::MixerSession;
