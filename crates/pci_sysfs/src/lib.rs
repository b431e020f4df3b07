//! PCI device and AER counter snapshots from Linux sysfs.
//!
//! Every call performs one fresh synchronous read of the filesystem; nothing
//! is cached and no call mutates device state. Values read from different
//! files of one device are not read atomically.
//!
//! Entry points, all methods on [`SysFs`]:
//! - `pci_devices()` - registry of /sys/bus/pci/devices
//! - `pci_device_aer()` / `PciDevice::aer_counters()` - AER of one device
//! - `root_port_aer_counters()` - totals of devices bound to pcieport
//! - `aer_counters_by_iface()` / `aer_counters()` - AER behind /sys/class/net

pub mod aer;
pub mod config;
pub mod device;
pub mod error;
pub mod fs;
pub mod location;
pub mod net_class;
pub mod rootport;
pub mod scan;

pub use aer::{
    parse_correctable, parse_device_aer, parse_root_port_totals, parse_uncorrectable,
    CorrectableAerCounters, CounterTable, DeviceAerCounters, RootPortTotals, Severity,
    UncorrectableAerCounters,
};
pub use config::SysfsConfig;
pub use device::{PciDevice, PciLinkInfo, PciPowerState, PowerInfo, SriovInfo};
pub use error::{Result, SysfsError};
pub use fs::SysFs;
pub use location::PciLocation;
pub use net_class::{AllInterfaceAerCounters, InterfaceAerCounters, NetClassIface};
pub use rootport::{parse_root_port_aer, AllRootPortAerCounters, RootPortAerCounters};
pub use scan::PciDevices;
