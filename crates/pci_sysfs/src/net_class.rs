//! Network interfaces and the AER counters of their backing PCI devices.
//!
//! Sources:
//! - /sys/class/net/<iface>/{operstate,address,mtu}
//! - /sys/class/net/<iface>/device/aer_dev_* (physical interfaces only)

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aer::{parse_device_aer, DeviceAerCounters};
use crate::error::{Result, SysfsError};
use crate::fs::{entries, exists, is_dir, read_optional, SysFs};

const NET_CLASS_PATH: [&str; 2] = ["class", "net"];

/// Minimal view of one /sys/class/net entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetClassIface {
    pub name: String,
    pub operstate: Option<String>,
    pub address: Option<String>,
    pub mtu: Option<u32>,
}

/// AER counters of the PCI device behind a network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAerCounters {
    pub name: String,
    #[serde(flatten)]
    pub counters: DeviceAerCounters,
}

/// Interface AER counters keyed by interface name.
pub type AllInterfaceAerCounters = BTreeMap<String, InterfaceAerCounters>;

impl SysFs {
    fn net_class_dir(&self) -> PathBuf {
        self.path(NET_CLASS_PATH)
    }

    /// Names of all network interfaces.
    pub fn net_class_devices(&self) -> Result<Vec<String>> {
        Ok(entries(&self.net_class_dir())?
            .into_iter()
            .filter(|e| !e.is_regular_file)
            .map(|e| e.name)
            .collect())
    }

    /// Look up one interface, failing with `InterfaceNotFound` unless it is a
    /// directory entry of /sys/class/net. Regular files such as
    /// `bonding_masters` are not interfaces.
    pub fn net_class_by_iface(&self, name: &str) -> Result<NetClassIface> {
        let dir = self.net_class_dir().join(name);
        if name.is_empty() || name.contains('/') || !is_dir(&dir)? {
            return Err(SysfsError::InterfaceNotFound {
                name: name.to_string(),
            });
        }

        let mtu = match read_optional(&dir.join("mtu"))?.filter(|v| !v.is_empty()) {
            Some(v) => Some(
                v.parse::<u32>()
                    .map_err(|e| SysfsError::numeric(dir.join("mtu"), &v, e))?,
            ),
            None => None,
        };

        Ok(NetClassIface {
            name: name.to_string(),
            operstate: read_optional(&dir.join("operstate"))?.filter(|v| !v.is_empty()),
            address: read_optional(&dir.join("address"))?.filter(|v| !v.is_empty()),
            mtu,
        })
    }

    /// AER counters for one interface. `None` when its device has no AER
    /// support or the interface has no backing device.
    pub fn aer_counters_by_iface(&self, name: &str) -> Result<Option<InterfaceAerCounters>> {
        let iface = self.net_class_by_iface(name)?;
        let device_dir = self.net_class_dir().join(&iface.name).join("device");
        if !exists(&device_dir)? {
            debug!(iface = %iface.name, "no backing device");
            return Ok(None);
        }

        Ok(parse_device_aer(&device_dir)?.map(|counters| InterfaceAerCounters {
            name: iface.name,
            counters,
        }))
    }

    /// AER counters for every interface backed by an AER capable device.
    ///
    /// Virtual interfaces (no `device` directory) and devices without AER
    /// are left out of the map.
    pub fn aer_counters(&self) -> Result<AllInterfaceAerCounters> {
        let mut all = AllInterfaceAerCounters::new();
        for name in self.net_class_devices()? {
            let device_dir = self.net_class_dir().join(&name).join("device");
            if !exists(&device_dir)? {
                debug!(iface = %name, "no device directory, skipping");
                continue;
            }
            match parse_device_aer(&device_dir)? {
                Some(counters) => {
                    all.insert(name.clone(), InterfaceAerCounters { name, counters });
                }
                None => debug!(iface = %name, "AER not supported, skipping"),
            }
        }
        Ok(all)
    }
}
