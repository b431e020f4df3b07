//! Enumeration of /sys/bus/pci/devices into a device registry.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::device::PciDevice;
use crate::error::{Result, SysfsError};
use crate::fs::{entries, resolve_symlink, SysFs};
use crate::location::PciLocation;

pub(crate) const PCI_DEVICES_PATH: [&str; 3] = ["bus", "pci", "devices"];

/// Every PCI device in /sys/bus/pci/devices, keyed by [`PciDevice::name`].
pub type PciDevices = BTreeMap<String, PciDevice>;

impl SysFs {
    /// Scan all PCI devices.
    ///
    /// Any malformed entry fails the whole scan; no partial registry is
    /// returned.
    pub fn pci_devices(&self) -> Result<PciDevices> {
        let dir = self.path(PCI_DEVICES_PATH);
        let listed = entries(&dir)?;
        debug!(path = %dir.display(), entries = listed.len(), "scanning PCI devices");

        let mut devices = PciDevices::new();
        for entry in listed {
            let device = parse_pci_device(&dir.join(&entry.name))?;
            devices.insert(device.name(), device);
        }
        Ok(devices)
    }
}

/// Each entry is a symlink like
/// `../../../devices/pci0000:00/0000:00:02.5/0000:04:00.0`: the last segment
/// is the device itself and the one before it is its parent.
fn parse_pci_device(link: &Path) -> Result<PciDevice> {
    let target = resolve_symlink(link)?;
    let (location, parent_location) = locations_from_target(&target)?;

    PciDevice::parse(link, location, parent_location).map_err(|e| e.for_device(location))
}

fn locations_from_target(target: &Path) -> Result<(PciLocation, Option<PciLocation>)> {
    let segment = |p: Option<&Path>| -> String {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let location = PciLocation::parse(&segment(Some(target)))?;

    // A "pci" prefixed parent is the host bridge, not a PCI function.
    let parent = segment(target.parent());
    if parent.is_empty() {
        return Err(SysfsError::MalformedLocation {
            text: target.display().to_string(),
            reason: "no parent segment".to_string(),
        });
    }
    let parent_location = if parent.starts_with("pci") {
        None
    } else {
        Some(PciLocation::parse(&parent)?)
    };

    Ok((location, parent_location))
}
