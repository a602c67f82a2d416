//! The get/set capability every mixer backend provides.

use crate::error::{MixerError, MixerResult};
use crate::key::{ParamKey, Target};
use std::collections::HashMap;
use std::sync::Mutex;

/// Float and string parameters addressed by `ParamKey`.
pub trait ParameterBus: Send + Sync {
    fn get_float(&self, key: &ParamKey) -> MixerResult<f32>;
    fn set_float(&self, key: &ParamKey, value: f32) -> MixerResult<()>;
    fn get_string(&self, key: &ParamKey) -> MixerResult<String>;
    fn set_string(&self, key: &ParamKey, value: &str) -> MixerResult<()>;
}

/// One recorded write, in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum BusWrite {
    Float(String, f32),
    Str(String, String),
}

/// In-memory mixer. Backs `mixer apply --dry-run` and tests.
///
/// Mirrors the vendor behaviour of exposing a written `device.wdm` through the
/// readable `device.name` field.
#[derive(Default)]
pub struct MemoryBus {
    floats: Mutex<HashMap<String, f32>>,
    strings: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<BusWrite>>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a float without recording a write.
    pub fn with_float(self, key: &str, value: f32) -> Self {
        if let Ok(mut g) = self.floats.lock() {
            g.insert(key.to_string(), value);
        }
        self
    }

    /// Make every call touching `key` fail with status -1.
    pub fn fail_on(&self, key: &str) {
        if let Ok(mut g) = self.fail_on.lock() {
            *g = Some(key.to_string());
        }
    }

    pub fn writes(&self) -> Vec<BusWrite> {
        self.writes.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        self.floats.lock().ok().and_then(|g| g.get(key).copied())
    }

    fn check(&self, key: &str, function: &'static str) -> MixerResult<()> {
        let failing = self
            .fail_on
            .lock()
            .map(|g| g.as_deref() == Some(key))
            .unwrap_or(false);
        if failing {
            Err(MixerError::Call { function, code: -1 })
        } else {
            Ok(())
        }
    }

    fn record(&self, write: BusWrite) {
        if let Ok(mut g) = self.writes.lock() {
            g.push(write);
        }
    }
}

impl ParameterBus for MemoryBus {
    fn get_float(&self, key: &ParamKey) -> MixerResult<f32> {
        let k = key.to_string();
        self.check(&k, "GetParameterFloat")?;
        Ok(self.float(&k).unwrap_or(0.0))
    }

    fn set_float(&self, key: &ParamKey, value: f32) -> MixerResult<()> {
        let k = key.to_string();
        self.check(&k, "SetParameterFloat")?;
        if let Ok(mut g) = self.floats.lock() {
            g.insert(k.clone(), value);
        }
        self.record(BusWrite::Float(k, value));
        Ok(())
    }

    fn get_string(&self, key: &ParamKey) -> MixerResult<String> {
        let k = key.to_string();
        self.check(&k, "GetParameterStringA")?;
        Ok(self
            .strings
            .lock()
            .ok()
            .and_then(|g| g.get(&k).cloned())
            .unwrap_or_default())
    }

    fn set_string(&self, key: &ParamKey, value: &str) -> MixerResult<()> {
        let k = key.to_string();
        self.check(&k, "SetParameterStringA")?;
        if let Ok(mut g) = self.strings.lock() {
            if key.field == "device.wdm" {
                let name_key = match key.target {
                    Target::Strip(i) => ParamKey::strip(i, "device.name"),
                    Target::Bus(j) => ParamKey::bus(j, "device.name"),
                };
                g.insert(name_key.to_string(), value.to_string());
            }
            g.insert(k.clone(), value.to_string());
        }
        self.record(BusWrite::Str(k, value.to_string()));
        Ok(())
    }
}
