//! PCI device records and the per-device attribute parser.
//!
//! Sources, all under /sys/bus/pci/devices/<location>/:
//! - class, vendor, device, subsystem_vendor, subsystem_device, revision (required)
//! - max_link_speed, max_link_width, current_link_speed, current_link_width, numa_node
//! - sriov_* (SR-IOV capable physical functions only)
//! - d3cold_allowed, power_state
//!
//! Refer to https://docs.kernel.org/PCI/sysfs-pci.html

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SysfsError};
use crate::fs::{read_optional, read_required};
use crate::location::PciLocation;

/// Suffix the kernel prints after the numeric link speed.
const LINK_SPEED_UNIT: &str = "GT/s PCIe";

/// Power state as reported by `power_state`. Unrecognised values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PciPowerState {
    Unknown,
    Error,
    D0,
    D1,
    D2,
    D3Hot,
    D3Cold,
    Other(String),
}

impl PciPowerState {
    pub fn as_str(&self) -> &str {
        match self {
            PciPowerState::Unknown => "unknown",
            PciPowerState::Error => "error",
            PciPowerState::D0 => "D0",
            PciPowerState::D1 => "D1",
            PciPowerState::D2 => "D2",
            PciPowerState::D3Hot => "D3hot",
            PciPowerState::D3Cold => "D3cold",
            PciPowerState::Other(s) => s,
        }
    }
}

impl From<&str> for PciPowerState {
    fn from(s: &str) -> Self {
        match s {
            "unknown" => PciPowerState::Unknown,
            "error" => PciPowerState::Error,
            "D0" => PciPowerState::D0,
            "D1" => PciPowerState::D1,
            "D2" => PciPowerState::D2,
            "D3hot" => PciPowerState::D3Hot,
            "D3cold" => PciPowerState::D3Cold,
            other => PciPowerState::Other(other.to_string()),
        }
    }
}

impl From<String> for PciPowerState {
    fn from(s: String) -> Self {
        PciPowerState::from(s.as_str())
    }
}

impl From<PciPowerState> for String {
    fn from(state: PciPowerState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for PciPowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PCIe link attributes. Speeds are in GT/s, widths in lanes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PciLinkInfo {
    pub max_speed: Option<f64>,
    pub max_width: Option<f64>,
    pub current_speed: Option<f64>,
    pub current_width: Option<f64>,
}

/// SR-IOV attributes of a physical function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SriovInfo {
    pub drivers_autoprobe: Option<bool>,
    pub numvfs: Option<u32>,
    pub offset: Option<u32>,
    pub stride: Option<u32>,
    pub totalvfs: Option<u32>,
    pub vf_device: Option<u32>,
    pub vf_total_msix: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerInfo {
    pub d3cold_allowed: Option<bool>,
    pub power_state: Option<PciPowerState>,
}

/// One PCI device as seen in /sys/bus/pci/devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PciDevice {
    pub location: PciLocation,
    /// Upstream bridge, if the parent is itself a PCI device
    pub parent_location: Option<PciLocation>,

    pub class: u32,
    pub vendor: u32,
    pub device: u32,
    pub subsystem_vendor: u32,
    pub subsystem_device: u32,
    pub revision: u32,

    pub numa_node: Option<i32>,
    pub link: PciLinkInfo,
    pub sriov: SriovInfo,
    pub power: PowerInfo,
}

impl PciDevice {
    /// Registry key, the colon form of the location.
    pub fn name(&self) -> String {
        self.location.to_string()
    }

    /// Read every attribute group from `dir`.
    pub(crate) fn parse(
        dir: &Path,
        location: PciLocation,
        parent_location: Option<PciLocation>,
    ) -> Result<Self> {
        let mut ids = [0u32; 6];
        for (slot, file) in ids.iter_mut().zip([
            "class",
            "vendor",
            "device",
            "subsystem_vendor",
            "subsystem_device",
            "revision",
        ]) {
            let path = dir.join(file);
            let value = read_required(&path)?;
            *slot = parse_prefixed_u32(&path, &value)?;
        }
        let [class, vendor, device, subsystem_vendor, subsystem_device, revision] = ids;

        Ok(Self {
            location,
            parent_location,
            class,
            vendor,
            device,
            subsystem_vendor,
            subsystem_device,
            revision,
            numa_node: read_link_attr(dir, "numa_node")?
                .map(|(path, v)| parse_num::<i32>(&path, &v))
                .transpose()?,
            link: parse_link_info(dir)?,
            sriov: parse_sriov_info(dir)?,
            power: parse_power_info(dir)?,
        })
    }
}

fn parse_link_info(dir: &Path) -> Result<PciLinkInfo> {
    let speed = |file: &'static str| -> Result<Option<f64>> {
        read_link_attr(dir, file)?
            .map(|(path, v)| parse_link_speed(&path, file, &v))
            .transpose()
    };
    let width = |file: &'static str| -> Result<Option<f64>> {
        read_link_attr(dir, file)?
            .map(|(path, v)| parse_num::<i64>(&path, &v).map(|w| w as f64))
            .transpose()
    };

    Ok(PciLinkInfo {
        max_speed: speed("max_link_speed")?,
        max_width: width("max_link_width")?,
        current_speed: speed("current_link_speed")?,
        current_width: width("current_link_width")?,
    })
}

fn parse_sriov_info(dir: &Path) -> Result<SriovInfo> {
    let decimal = |file: &str| -> Result<Option<u32>> {
        read_attr(dir, file)?
            .map(|(path, v)| parse_num::<u32>(&path, &v))
            .transpose()
    };

    Ok(SriovInfo {
        drivers_autoprobe: read_attr(dir, "sriov_drivers_autoprobe")?
            .map(|(path, v)| parse_flag(&path, &v))
            .transpose()?,
        numvfs: decimal("sriov_numvfs")?,
        offset: decimal("sriov_offset")?,
        stride: decimal("sriov_stride")?,
        totalvfs: decimal("sriov_totalvfs")?,
        vf_device: read_attr(dir, "sriov_vf_device")?
            .map(|(path, v)| parse_hex_u32(&path, &v))
            .transpose()?,
        vf_total_msix: read_attr(dir, "sriov_vf_total_msix")?
            .map(|(path, v)| parse_num::<u64>(&path, &v))
            .transpose()?,
    })
}

fn parse_power_info(dir: &Path) -> Result<PowerInfo> {
    Ok(PowerInfo {
        d3cold_allowed: read_attr(dir, "d3cold_allowed")?
            .map(|(path, v)| parse_flag(&path, &v))
            .transpose()?,
        power_state: read_attr(dir, "power_state")?.map(|(_, v)| PciPowerState::from(v)),
    })
}

/// Optional attribute; absent when missing or blank.
fn read_attr(dir: &Path, file: &str) -> Result<Option<(PathBuf, String)>> {
    let path = dir.join(file);
    Ok(read_optional(&path)?
        .filter(|v| !v.is_empty())
        .map(|v| (path, v)))
}

/// Like [`read_attr`], but also treats the kernel's "Unknown" placeholder as
/// absent (see pci_speed_string in drivers/pci/probe.c).
fn read_link_attr(dir: &Path, file: &str) -> Result<Option<(PathBuf, String)>> {
    Ok(read_attr(dir, file)?.filter(|(_, v)| !v.starts_with("Unknown")))
}

/// Parse "8.0 GT/s PCIe" into 8.0.
fn parse_link_speed(path: &Path, attribute: &'static str, value: &str) -> Result<f64> {
    let unknown_unit = || SysfsError::UnknownUnit {
        attribute,
        value: value.to_string(),
        path: path.to_path_buf(),
    };
    let (number, unit) = value.split_once(' ').ok_or_else(unknown_unit)?;
    if unit != LINK_SPEED_UNIT {
        return Err(unknown_unit());
    }
    parse_num::<f64>(path, number.trim())
}

/// Integer with optional `0x` prefix, decimal otherwise.
fn parse_prefixed_u32(path: &Path, value: &str) -> Result<u32> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|e| SysfsError::numeric(path, value, e)),
        None => parse_num(path, value),
    }
}

fn parse_hex_u32(path: &Path, value: &str) -> Result<u32> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u32::from_str_radix(digits, 16).map_err(|e| SysfsError::numeric(path, value, e))
}

/// Kernel booleans are printed as 0 or 1.
fn parse_flag(path: &Path, value: &str) -> Result<bool> {
    parse_num::<i64>(path, value).map(|v| v != 0)
}

fn parse_num<T>(path: &Path, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| SysfsError::numeric(path, value, e))
}
