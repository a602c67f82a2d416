//! Logged-in mixer handle. Login on open, logout on drop.

use crate::bus::ParameterBus;
use crate::error::{MixerError, MixerResult};
use crate::key::ParamKey;
use crate::remote::{Edition, LoginStatus, RemoteControl, VoicemeeterRemote};
use std::time::Duration;
use tracing::{info, warn};

pub struct MixerSession<R: RemoteControl = VoicemeeterRemote> {
    remote: R,
    logged_in: bool,
}

impl<R: RemoteControl> MixerSession<R> {
    /// Log in; when the mixer application isn't running, start `edition` and
    /// give it `ready_delay` to come up.
    pub fn open(remote: R, edition: Edition, ready_delay: Duration) -> MixerResult<Self> {
        let status = remote.login()?;
        // From here on Drop owns the logout.
        let session = Self {
            remote,
            logged_in: true,
        };
        if status == LoginStatus::AppNotRunning {
            info!("🚀 Mixer not running, starting {}", edition);
            session.remote.run(edition)?;
            std::thread::sleep(ready_delay);
        }
        match session.remote.edition() {
            Ok(Some(running)) => info!("🎛️ Connected to {}", running),
            Ok(None) => warn!("Connected to an unknown mixer edition"),
            Err(e) => warn!("Could not query mixer edition: {}", e),
        }
        Ok(session)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    /// Explicit logout. Drop does the same if this is never called.
    pub fn close(mut self) -> MixerResult<()> {
        self.logout()
    }

    fn logout(&mut self) -> MixerResult<()> {
        if !self.logged_in {
            return Ok(());
        }
        self.logged_in = false;
        self.remote.logout()?;
        info!("👋 Logged out from mixer");
        Ok(())
    }

    fn ensure(&self) -> MixerResult<()> {
        if self.logged_in {
            Ok(())
        } else {
            Err(MixerError::NotLoggedIn)
        }
    }
}

impl<R: RemoteControl> ParameterBus for MixerSession<R> {
    fn get_float(&self, key: &ParamKey) -> MixerResult<f32> {
        self.ensure()?;
        self.remote.get_float(key)
    }

    fn set_float(&self, key: &ParamKey, value: f32) -> MixerResult<()> {
        self.ensure()?;
        self.remote.set_float(key, value)
    }

    fn get_string(&self, key: &ParamKey) -> MixerResult<String> {
        self.ensure()?;
        self.remote.get_string(key)
    }

    fn set_string(&self, key: &ParamKey, value: &str) -> MixerResult<()> {
        self.ensure()?;
        self.remote.set_string(key, value)
    }
}

impl<R: RemoteControl> Drop for MixerSession<R> {
    fn drop(&mut self) {
        if let Err(e) = self.logout() {
            warn!("Mixer logout failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryBus;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Calls {
        login: AtomicUsize,
        logout: AtomicUsize,
        run: AtomicI32,
    }

    struct FakeRemote {
        login_code: i32,
        calls: Arc<Calls>,
        bus: MemoryBus,
    }

    impl FakeRemote {
        fn new(login_code: i32) -> (Self, Arc<Calls>) {
            let calls = Arc::new(Calls::default());
            (
                Self {
                    login_code,
                    calls: calls.clone(),
                    bus: MemoryBus::new(),
                },
                calls,
            )
        }
    }

    impl ParameterBus for FakeRemote {
        fn get_float(&self, key: &ParamKey) -> MixerResult<f32> {
            self.bus.get_float(key)
        }
        fn set_float(&self, key: &ParamKey, value: f32) -> MixerResult<()> {
            self.bus.set_float(key, value)
        }
        fn get_string(&self, key: &ParamKey) -> MixerResult<String> {
            self.bus.get_string(key)
        }
        fn set_string(&self, key: &ParamKey, value: &str) -> MixerResult<()> {
            self.bus.set_string(key, value)
        }
    }

    impl RemoteControl for FakeRemote {
        fn login(&self) -> MixerResult<LoginStatus> {
            self.calls.login.fetch_add(1, Ordering::SeqCst);
            LoginStatus::from_code(self.login_code)
        }
        fn logout(&self) -> MixerResult<()> {
            self.calls.logout.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn run(&self, edition: Edition) -> MixerResult<()> {
            self.calls.run.store(edition.code(), Ordering::SeqCst);
            Ok(())
        }
        fn edition(&self) -> MixerResult<Option<Edition>> {
            Ok(Some(Edition::Banana))
        }
    }

    #[test]
    fn starts_app_when_not_running_and_logs_out_on_drop() {
        let (remote, calls) = FakeRemote::new(1);
        {
            let session = MixerSession::open(remote, Edition::Banana, Duration::ZERO).unwrap();
            session.set_float(&ParamKey::strip(0, "B1"), 1.0).unwrap();
        }
        assert_eq!(calls.login.load(Ordering::SeqCst), 1);
        assert_eq!(calls.run.load(Ordering::SeqCst), 2);
        assert_eq!(calls.logout.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn running_app_is_not_restarted() {
        let (remote, calls) = FakeRemote::new(0);
        let session = MixerSession::open(remote, Edition::Potato, Duration::ZERO).unwrap();
        session.close().unwrap();
        assert_eq!(calls.run.load(Ordering::SeqCst), 0);
        assert_eq!(calls.logout.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_login_never_logs_out() {
        let (remote, calls) = FakeRemote::new(-1);
        assert!(MixerSession::open(remote, Edition::Banana, Duration::ZERO).is_err());
        assert_eq!(calls.logout.load(Ordering::SeqCst), 0);
    }
}
