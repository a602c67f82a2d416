//! Typed mixer route: one strip bound to the capture cable, one bus bound to the
//! playback cable, explicit routing flags. Rendered to vendor keys only here.

use crate::bus::ParameterBus;
use crate::error::MixerResult;
use crate::key::{OutputBus, ParamKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Floats closer than this read back as equal.
const FLOAT_TOLERANCE: f32 = 0.01;

/// Per-strip routing flags. Every flag is written on apply, so `false` means "off".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFlags {
    pub a1: bool,
    pub a2: bool,
    pub a3: bool,
    pub b1: bool,
    pub b2: bool,
}

impl OutputFlags {
    pub fn get(&self, bus: OutputBus) -> bool {
        match bus {
            OutputBus::A1 => self.a1,
            OutputBus::A2 => self.a2,
            OutputBus::A3 => self.a3,
            OutputBus::B1 => self.b1,
            OutputBus::B2 => self.b2,
        }
    }

    pub fn set(&mut self, bus: OutputBus, on: bool) {
        match bus {
            OutputBus::A1 => self.a1 = on,
            OutputBus::A2 => self.a2 = on,
            OutputBus::A3 => self.a3 = on,
            OutputBus::B1 => self.b1 = on,
            OutputBus::B2 => self.b2 = on,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerRoute {
    pub strip_index: usize,
    /// WDM device bound to the strip (the cable's capture side).
    pub strip_device: String,
    /// dB.
    pub strip_gain: f32,
    pub outputs: OutputFlags,
    pub bus_index: usize,
    /// WDM device bound to the bus (the cable's playback side).
    pub bus_device: String,
    /// dB.
    pub bus_gain: f32,
}

impl Default for MixerRoute {
    fn default() -> Self {
        Self {
            strip_index: 0,
            strip_device: "CABLE Output (VB-Audio Virtual Cable)".to_string(),
            strip_gain: 0.0,
            outputs: OutputFlags {
                a1: true,
                b1: true,
                ..OutputFlags::default()
            },
            bus_index: OutputBus::B1.bus_index(),
            bus_device: "CABLE Input (VB-Audio Virtual Cable)".to_string(),
            bus_gain: 0.0,
        }
    }
}

/// One read-back value that didn't match what was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub key: String,
    pub expected: String,
    pub actual: String,
}

/// Result of the advisory read-back. Never fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub mismatches: Vec<Mismatch>,
    /// Keys that could not be read at all.
    pub unreadable: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.unreadable.is_empty()
    }

    fn float(&mut self, bus: &dyn ParameterBus, key: ParamKey, expected: f32) {
        match bus.get_float(&key) {
            Ok(actual) if (actual - expected).abs() <= FLOAT_TOLERANCE => {}
            Ok(actual) => self.mismatches.push(Mismatch {
                key: key.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            Err(_) => self.unreadable.push(key.to_string()),
        }
    }

    /// Devices read back through `device.name`, which may drop the driver suffix.
    fn device(&mut self, bus: &dyn ParameterBus, key: ParamKey, expected: &str) {
        match bus.get_string(&key) {
            Ok(actual) if !actual.is_empty() && expected.starts_with(actual.as_str()) => {}
            Ok(actual) => self.mismatches.push(Mismatch {
                key: key.to_string(),
                expected: expected.to_string(),
                actual,
            }),
            Err(_) => self.unreadable.push(key.to_string()),
        }
    }

    pub fn log(&self) {
        if self.is_clean() {
            info!("✅ Mixer route verified");
            return;
        }
        for m in &self.mismatches {
            warn!("⚠️ {} reads '{}' (expected '{}')", m.key, m.actual, m.expected);
        }
        for key in &self.unreadable {
            warn!("⚠️ {} could not be read back", key);
        }
    }
}

fn flag(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

impl MixerRoute {
    /// Write every parameter of the route. Stops at the first failed write.
    pub fn apply(&self, bus: &dyn ParameterBus) -> MixerResult<()> {
        info!(
            "🎚️ Routing Strip[{}] ({}) -> Bus[{}] ({})",
            self.strip_index, self.strip_device, self.bus_index, self.bus_device
        );
        bus.set_string(&ParamKey::strip(self.strip_index, "device.wdm"), &self.strip_device)?;
        for out in OutputBus::ALL {
            bus.set_float(
                &ParamKey::strip(self.strip_index, out.as_str()),
                flag(self.outputs.get(out)),
            )?;
        }
        bus.set_string(&ParamKey::bus(self.bus_index, "device.wdm"), &self.bus_device)?;
        bus.set_float(&ParamKey::strip(self.strip_index, "Gain"), self.strip_gain)?;
        bus.set_float(&ParamKey::bus(self.bus_index, "Gain"), self.bus_gain)?;
        Ok(())
    }

    /// Read everything back and report differences.
    pub fn verify(&self, bus: &dyn ParameterBus) -> ApplyReport {
        let mut report = ApplyReport::default();
        report.device(bus, ParamKey::strip(self.strip_index, "device.name"), &self.strip_device);
        for out in OutputBus::ALL {
            report.float(
                bus,
                ParamKey::strip(self.strip_index, out.as_str()),
                flag(self.outputs.get(out)),
            );
        }
        report.device(bus, ParamKey::bus(self.bus_index, "device.name"), &self.bus_device);
        report.float(bus, ParamKey::strip(self.strip_index, "Gain"), self.strip_gain);
        report.float(bus, ParamKey::bus(self.bus_index, "Gain"), self.bus_gain);
        report
    }

    pub fn apply_and_verify(&self, bus: &dyn ParameterBus) -> MixerResult<ApplyReport> {
        self.apply(bus)?;
        let report = self.verify(bus);
        report.log();
        Ok(report)
    }

    /// Current state of the strip/bus this route addresses.
    pub fn snapshot(&self, bus: &dyn ParameterBus) -> MixerResult<RouteSnapshot> {
        let mut outputs = OutputFlags::default();
        for out in OutputBus::ALL {
            let v = bus.get_float(&ParamKey::strip(self.strip_index, out.as_str()))?;
            outputs.set(out, v >= 0.5);
        }
        Ok(RouteSnapshot {
            strip_index: self.strip_index,
            strip_device: bus.get_string(&ParamKey::strip(self.strip_index, "device.name"))?,
            strip_gain: bus.get_float(&ParamKey::strip(self.strip_index, "Gain"))?,
            outputs,
            bus_index: self.bus_index,
            bus_device: bus.get_string(&ParamKey::bus(self.bus_index, "device.name"))?,
            bus_gain: bus.get_float(&ParamKey::bus(self.bus_index, "Gain"))?,
        })
    }
}

/// What the mixer currently holds, for `mixer show`.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSnapshot {
    pub strip_index: usize,
    pub strip_device: String,
    pub strip_gain: f32,
    pub outputs: OutputFlags,
    pub bus_index: usize,
    pub bus_device: String,
    pub bus_gain: f32,
}

impl fmt::Display for RouteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strip[{}]", self.strip_index)?;
        writeln!(f, "  device : {}", self.strip_device)?;
        writeln!(f, "  gain   : {:.1} dB", self.strip_gain)?;
        let routed: Vec<&str> = OutputBus::ALL
            .iter()
            .filter(|b| self.outputs.get(**b))
            .map(|b| b.as_str())
            .collect();
        writeln!(f, "  routes : {}", if routed.is_empty() { "-".to_string() } else { routed.join(" ") })?;
        writeln!(f, "Bus[{}]", self.bus_index)?;
        writeln!(f, "  device : {}", self.bus_device)?;
        write!(f, "  gain   : {:.1} dB", self.bus_gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryBus, BusWrite};

    #[test]
    fn apply_writes_every_flag_in_order() {
        let bus = MemoryBus::new();
        MixerRoute::default().apply(&bus).unwrap();
        let writes = bus.writes();
        assert_eq!(
            writes,
            vec![
                BusWrite::Str("Strip[0].device.wdm".into(), "CABLE Output (VB-Audio Virtual Cable)".into()),
                BusWrite::Float("Strip[0].A1".into(), 1.0),
                BusWrite::Float("Strip[0].A2".into(), 0.0),
                BusWrite::Float("Strip[0].A3".into(), 0.0),
                BusWrite::Float("Strip[0].B1".into(), 1.0),
                BusWrite::Float("Strip[0].B2".into(), 0.0),
                BusWrite::Str("Bus[3].device.wdm".into(), "CABLE Input (VB-Audio Virtual Cable)".into()),
                BusWrite::Float("Strip[0].Gain".into(), 0.0),
                BusWrite::Float("Bus[3].Gain".into(), 0.0),
            ]
        );
    }

    #[test]
    fn verify_is_clean_after_apply() {
        let bus = MemoryBus::new();
        let report = MixerRoute::default().apply_and_verify(&bus).unwrap();
        assert!(report.is_clean(), "{:?}", report);
    }

    #[test]
    fn verify_reports_drift_without_failing() {
        let route = MixerRoute::default();
        let bus = MemoryBus::new();
        route.apply(&bus).unwrap();
        bus.set_float(&ParamKey::strip(0, "A2"), 1.0).unwrap();
        bus.fail_on("Bus[3].Gain");

        let report = route.verify(&bus);
        assert_eq!(
            report.mismatches,
            vec![Mismatch {
                key: "Strip[0].A2".into(),
                expected: "0".into(),
                actual: "1".into(),
            }]
        );
        assert_eq!(report.unreadable, vec!["Bus[3].Gain".to_string()]);
    }

    #[test]
    fn apply_stops_on_failed_write() {
        let bus = MemoryBus::new();
        bus.fail_on("Strip[0].B1");
        assert!(MixerRoute::default().apply(&bus).is_err());
        assert!(bus.float("Bus[3].Gain").is_none());
    }

    #[test]
    fn snapshot_reads_current_state() {
        let bus = MemoryBus::new();
        let route = MixerRoute::default();
        route.apply(&bus).unwrap();
        let snap = route.snapshot(&bus).unwrap();
        assert!(snap.outputs.a1 && snap.outputs.b1 && !snap.outputs.a2);
        assert_eq!(snap.bus_device, "CABLE Input (VB-Audio Virtual Cable)");
        assert!(snap.to_string().contains("routes : A1 B1"));
    }
}
