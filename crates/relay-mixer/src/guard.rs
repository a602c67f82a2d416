//! Feedback guard: keep the capture strip off the playback bus while recording.

use crate::bus::ParameterBus;
use crate::error::MixerResult;
use crate::key::{OutputBus, ParamKey};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The routing flag (`Strip[i].<bus>`) that would loop the reply back into the cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRouting {
    pub strip_index: usize,
    pub bus: OutputBus,
}

impl Default for CaptureRouting {
    fn default() -> Self {
        Self {
            strip_index: 0,
            bus: OutputBus::B1,
        }
    }
}

impl CaptureRouting {
    pub fn key(&self) -> ParamKey {
        ParamKey::strip(self.strip_index, self.bus.as_str())
    }

    /// Turn the flag off until the returned guard is dropped.
    pub fn engage<'a>(&self, bus: &'a dyn ParameterBus) -> MixerResult<FeedbackGuard<'a>> {
        FeedbackGuard::engage(bus, self.key())
    }
}

/// Restores the flag's previous value on drop, on every exit path.
pub struct FeedbackGuard<'a> {
    bus: &'a dyn ParameterBus,
    key: ParamKey,
    restore: f32,
}

impl<'a> FeedbackGuard<'a> {
    pub fn engage(bus: &'a dyn ParameterBus, key: ParamKey) -> MixerResult<Self> {
        // Unreadable means we can't tell; the session route has it on.
        let restore = bus.get_float(&key).unwrap_or(1.0);
        bus.set_float(&key, 0.0)?;
        match bus.get_float(&key) {
            Ok(v) if v == 0.0 => info!("🔇 {} off for capture", key),
            Ok(v) => warn!("⚠️ {} reads {} after disabling", key, v),
            Err(e) => warn!("⚠️ {} could not be read back: {}", key, e),
        }
        Ok(Self { bus, key, restore })
    }
}

impl Drop for FeedbackGuard<'_> {
    fn drop(&mut self) {
        match self.bus.set_float(&self.key, self.restore) {
            Ok(()) => info!("🔈 {} restored to {}", self.key, self.restore),
            Err(e) => warn!("Failed to restore {}: {}", self.key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryBus, BusWrite};

    #[test]
    fn guard_disables_then_restores() {
        let bus = MemoryBus::new().with_float("Strip[0].B1", 1.0);
        let routing = CaptureRouting::default();
        {
            let _guard = routing.engage(&bus).unwrap();
            assert_eq!(bus.float("Strip[0].B1"), Some(0.0));
        }
        assert_eq!(bus.float("Strip[0].B1"), Some(1.0));
        assert_eq!(
            bus.writes(),
            vec![
                BusWrite::Float("Strip[0].B1".into(), 0.0),
                BusWrite::Float("Strip[0].B1".into(), 1.0),
            ]
        );
    }

    #[test]
    fn restores_on_early_return() {
        fn capture(bus: &dyn ParameterBus) -> Result<(), String> {
            let _guard = CaptureRouting::default().engage(bus).map_err(|e| e.to_string())?;
            Err("stream error".to_string())
        }
        let bus = MemoryBus::new().with_float("Strip[0].B1", 1.0);
        assert!(capture(&bus).is_err());
        assert_eq!(bus.float("Strip[0].B1"), Some(1.0));
    }

    #[test]
    fn preserves_previous_off_state() {
        let bus = MemoryBus::new().with_float("Strip[0].B1", 0.0);
        drop(CaptureRouting::default().engage(&bus).unwrap());
        assert_eq!(bus.float("Strip[0].B1"), Some(0.0));
    }
}
