//! Parameter keys in the vendor grammar: `Strip[<i>].<field>` / `Bus[<j>].<field>`.

use crate::error::{MixerError, MixerResult};
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::fmt;
use std::str::FromStr;

/// Which mixer object a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Strip(usize),
    Bus(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamKey {
    pub target: Target,
    pub field: String,
}

impl ParamKey {
    pub fn strip(index: usize, field: impl Into<String>) -> Self {
        Self {
            target: Target::Strip(index),
            field: field.into(),
        }
    }

    pub fn bus(index: usize, field: impl Into<String>) -> Self {
        Self {
            target: Target::Bus(index),
            field: field.into(),
        }
    }

    /// NUL-terminated ASCII for the FFI call.
    pub fn to_cstring(&self) -> MixerResult<CString> {
        let rendered = self.to_string();
        if !rendered.is_ascii() {
            return Err(MixerError::InvalidKey(rendered));
        }
        CString::new(rendered.clone()).map_err(|_| MixerError::InvalidKey(rendered))
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Target::Strip(i) => write!(f, "Strip[{}].{}", i, self.field),
            Target::Bus(j) => write!(f, "Bus[{}].{}", j, self.field),
        }
    }
}

impl FromStr for ParamKey {
    type Err = MixerError;

    fn from_str(s: &str) -> MixerResult<Self> {
        let invalid = || MixerError::InvalidKey(s.to_string());
        let (head, field) = s.split_once("].").ok_or_else(invalid)?;
        let (kind, index) = head.split_once('[').ok_or_else(invalid)?;
        let index: usize = index.parse().map_err(|_| invalid())?;
        if field.is_empty() || field.chars().any(|c| c.is_whitespace() || c == '\0') {
            return Err(invalid());
        }
        match kind {
            "Strip" => Ok(ParamKey::strip(index, field)),
            "Bus" => Ok(ParamKey::bus(index, field)),
            _ => Err(invalid()),
        }
    }
}

/// Strip routing flags. A1..A3 are hardware outputs, B1/B2 virtual outputs (Banana).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputBus {
    A1,
    A2,
    A3,
    B1,
    B2,
}

impl OutputBus {
    pub const ALL: [OutputBus; 5] = [
        OutputBus::A1,
        OutputBus::A2,
        OutputBus::A3,
        OutputBus::B1,
        OutputBus::B2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputBus::A1 => "A1",
            OutputBus::A2 => "A2",
            OutputBus::A3 => "A3",
            OutputBus::B1 => "B1",
            OutputBus::B2 => "B2",
        }
    }

    /// Zero-based `Bus[j]` index of this output on Banana (A1=0 .. B2=4).
    pub fn bus_index(self) -> usize {
        match self {
            OutputBus::A1 => 0,
            OutputBus::A2 => 1,
            OutputBus::A3 => 2,
            OutputBus::B1 => 3,
            OutputBus::B2 => 4,
        }
    }
}

impl fmt::Display for OutputBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_vendor_grammar() {
        assert_eq!(ParamKey::strip(0, "device.wdm").to_string(), "Strip[0].device.wdm");
        assert_eq!(ParamKey::bus(3, "Gain").to_string(), "Bus[3].Gain");
        assert_eq!(
            ParamKey::strip(2, OutputBus::B1.as_str()).to_cstring().unwrap().as_bytes(),
            b"Strip[2].B1"
        );
    }

    #[test]
    fn parses_and_rejects() {
        let key: ParamKey = "Bus[3].device.wdm".parse().unwrap();
        assert_eq!(key, ParamKey::bus(3, "device.wdm"));
        for bad in ["Strip0.A1", "Strip[x].A1", "Deck[0].A1", "Bus[1].", "Bus[1].a b"] {
            assert!(matches!(bad.parse::<ParamKey>(), Err(MixerError::InvalidKey(_))), "{bad}");
        }
    }

    #[test]
    fn b1_is_bus_three() {
        assert_eq!(OutputBus::B1.bus_index(), 3);
    }
}
