//! PCI Segment:Bus:Device.Function addressing.
//!
//! Two text forms exist in sysfs: the kernel directory name `0000:01:00.0`
//! and the colon form `0000:01:00:0`. Both parse to the same value; the colon
//! form is what `Display` produces and what keys the device registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SysfsError};

const MAX_DEVICE: u8 = 0x1f;
const MAX_FUNCTION: u8 = 0x7;

/// Location of a PCI function. Only built through [`PciLocation::new`] or
/// [`PciLocation::parse`], so device and function are always in range.
///
/// ```compile_fail
/// let loc = pci_sysfs::PciLocation { segment: 0, bus: 1, device: 0x20, function: 9 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PciLocation {
    segment: u16,
    bus: u8,
    device: u8,
    function: u8,
}

impl PciLocation {
    /// Build a location, rejecting device numbers above 0x1f and function
    /// numbers above 0x7.
    pub fn new(segment: u16, bus: u8, device: u8, function: u8) -> Result<Self> {
        if device > MAX_DEVICE || function > MAX_FUNCTION {
            return Err(SysfsError::MalformedLocation {
                text: format!("{segment:04x}:{bus:02x}:{device:02x}:{function:x}"),
                reason: "device or function out of range".to_string(),
            });
        }
        Ok(Self {
            segment,
            bus,
            device,
            function,
        })
    }

    /// Parse `SSSS:BB:DD.F` or `SSSS:BB:DD:F`.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |reason: &str| SysfsError::MalformedLocation {
            text: text.to_string(),
            reason: reason.to_string(),
        };

        let mut parts: Vec<&str> = text.split(':').collect();
        if parts.len() == 3 {
            let (device, function) = parts[2]
                .split_once('.')
                .ok_or_else(|| malformed("missing function"))?;
            parts.truncate(2);
            parts.push(device);
            parts.push(function);
        }
        if parts.len() != 4 {
            return Err(malformed("expected four components"));
        }

        let component = |part: &str, reason: &str| -> Result<u16> {
            hex_digits(part)
                .and_then(|digits| u16::from_str_radix(digits, 16).ok())
                .ok_or_else(|| malformed(reason))
        };
        let segment = component(parts[0], "invalid segment")?;
        let byte = |part: &str, reason: &str| -> Result<u8> {
            u8::try_from(component(part, reason)?).map_err(|_| malformed(reason))
        };
        let bus = byte(parts[1], "invalid bus")?;
        let device = byte(parts[2], "invalid device")?;
        let function = byte(parts[3], "invalid function")?;

        if device > MAX_DEVICE {
            return Err(malformed("device out of range"));
        }
        if function > MAX_FUNCTION {
            return Err(malformed("function out of range"));
        }

        Ok(Self {
            segment,
            bus,
            device,
            function,
        })
    }

    pub fn segment(&self) -> u16 {
        self.segment
    }

    pub fn bus(&self) -> u8 {
        self.bus
    }

    pub fn device(&self) -> u8 {
        self.device
    }

    pub fn function(&self) -> u8 {
        self.function
    }

    /// Directory name under `/sys/bus/pci/devices`, e.g. `0000:01:00.0`.
    pub fn directory_name(&self) -> String {
        format!(
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

/// Only bare hex digits; `from_str_radix` alone would also take a leading `+`.
fn hex_digits(text: &str) -> Option<&str> {
    (!text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit())).then_some(text)
}

impl fmt::Display for PciLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}:{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

impl FromStr for PciLocation {
    type Err = SysfsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<PciLocation> for String {
    fn from(loc: PciLocation) -> Self {
        loc.to_string()
    }
}

impl TryFrom<String> for PciLocation {
    type Error = SysfsError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}
