//! Device Resolver: enumerate host audio devices and pick the virtual cable by name.
//!
//! Descriptors are read fresh from the host on every call; nothing is cached. The
//! `index` is the position in the host's enumeration order, which can shift
//! between enumerations (driver updates, hot-plug). `open_device` re-checks the
//! name before handing out a live handle.

use crate::error::{AudioError, AudioResult};
use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Name fragment shared by every VB-Audio virtual cable endpoint.
const VIRTUAL_CABLE_MARKER: &str = "CABLE";

/// Stream direction a device is needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// One host audio device as seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDeviceDescriptor {
    /// Position in the host enumeration (not stable across enumerations).
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: u32,
}

impl AudioDeviceDescriptor {
    /// Channel count available for the given direction.
    pub fn channels_for(&self, direction: Direction) -> u16 {
        match direction {
            Direction::Input => self.max_input_channels,
            Direction::Output => self.max_output_channels,
        }
    }

    pub fn supports(&self, direction: Direction) -> bool {
        self.channels_for(direction) > 0
    }
}

/// Enumerate every device on the default host.
pub fn list_devices() -> AudioResult<Vec<AudioDeviceDescriptor>> {
    let host = cpal::default_host();
    let mut out = Vec::new();
    for (index, device) in host.devices()?.enumerate() {
        let name = device.name().unwrap_or_else(|_| format!("Unknown device #{}", index));
        let max_input_channels = device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let default_sample_rate = device
            .default_output_config()
            .or_else(|_| device.default_input_config())
            .map(|c| c.sample_rate().0)
            .unwrap_or(0);

        debug!(
            index,
            name = %name,
            max_input_channels,
            max_output_channels,
            default_sample_rate,
            "enumerated audio device"
        );
        out.push(AudioDeviceDescriptor {
            index,
            name,
            max_input_channels,
            max_output_channels,
            default_sample_rate,
        });
    }
    Ok(out)
}

/// Descriptors that have at least one channel in `direction`.
pub fn list_by_direction(
    devices: &[AudioDeviceDescriptor],
    direction: Direction,
) -> Vec<AudioDeviceDescriptor> {
    devices.iter().filter(|d| d.supports(direction)).cloned().collect()
}

/// First descriptor (in list order) whose name contains `needle` and that has
/// channels for `direction`. Matching is a plain case-sensitive substring test;
/// ambiguous names resolve to enumeration order.
pub fn resolve<'a>(
    devices: &'a [AudioDeviceDescriptor],
    needle: &str,
    direction: Direction,
) -> Option<&'a AudioDeviceDescriptor> {
    devices
        .iter()
        .find(|d| d.name.contains(needle) && d.supports(direction))
}

/// CLI helper: `spec` is either a numeric device index or a name substring.
pub fn resolve_or_index(
    devices: &[AudioDeviceDescriptor],
    spec: &str,
    direction: Direction,
) -> AudioResult<AudioDeviceDescriptor> {
    let found = match spec.trim().parse::<usize>() {
        Ok(index) => devices.iter().find(|d| d.index == index && d.supports(direction)),
        Err(_) => resolve(devices, spec, direction),
    };
    found.cloned().ok_or_else(|| AudioError::DeviceNotFound {
        needle: spec.to_string(),
        direction,
    })
}

/// Live handle for a descriptor. Re-enumerates and fails if the device at that
/// index no longer carries the same name.
pub fn open_device(
    descriptor: &AudioDeviceDescriptor,
    direction: Direction,
) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    let device = host
        .devices()?
        .nth(descriptor.index)
        .ok_or_else(|| AudioError::DeviceNotFound {
            needle: descriptor.name.clone(),
            direction,
        })?;
    let name = device.name()?;
    if name != descriptor.name {
        warn!(
            "Device #{} is now '{}' (expected '{}')",
            descriptor.index, name, descriptor.name
        );
        return Err(AudioError::DeviceShifted {
            index: descriptor.index,
            expected: descriptor.name.clone(),
        });
    }
    Ok(device)
}

/// Names of the host's default input and output devices, if any.
pub fn default_device_names() -> (Option<String>, Option<String>) {
    let host = cpal::default_host();
    let input = host.default_input_device().and_then(|d| d.name().ok());
    let output = host.default_output_device().and_then(|d| d.name().ok());
    (input, output)
}

/// Human-readable device table, with a separate section for virtual cables.
pub fn render_device_table(
    devices: &[AudioDeviceDescriptor],
    default_input: Option<&str>,
    default_output: Option<&str>,
) -> String {
    let mut out = String::new();
    out.push_str("\n=== AUDIO DEVICES ===\n");
    out.push_str(&format!(
        "{:<4} {:<40} {:<4} {:<4} {:<8} {:<8}\n",
        "ID", "Name", "In", "Out", "Rate", "Default"
    ));
    out.push_str(&"-".repeat(73));
    out.push('\n');

    for d in devices {
        let mut default = String::new();
        if default_input == Some(d.name.as_str()) && d.max_input_channels > 0 {
            default.push_str("IN ");
        }
        if default_output == Some(d.name.as_str()) && d.max_output_channels > 0 {
            default.push_str("OUT");
        }
        let short: String = d.name.chars().take(39).collect();
        out.push_str(&format!(
            "{:<4} {:<40} {:<4} {:<4} {:<8} {:<8}\n",
            d.index, short, d.max_input_channels, d.max_output_channels, d.default_sample_rate, default
        ));
    }

    let cables: Vec<&AudioDeviceDescriptor> = devices
        .iter()
        .filter(|d| d.name.contains(VIRTUAL_CABLE_MARKER))
        .collect();
    if cables.is_empty() {
        out.push_str("\nNo virtual cable devices found!\n");
    } else {
        out.push_str("\nVIRTUAL CABLE DEVICES:\n");
        for d in cables {
            out.push_str(&format!(
                "ID {}: {} (In: {}, Out: {})\n",
                d.index, d.name, d.max_input_channels, d.max_output_channels
            ));
        }
    }
    out
}
