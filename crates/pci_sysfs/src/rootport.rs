//! Root port AER totals for devices bound to the PCIe port driver.
//!
//! Source: /sys/bus/pci/drivers/pcieport/<device>/aer_rootport_total_err_*

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aer::{
    parse_total_value, Presence, RecordGate, Required, ROOTPORT_TOTAL_ERR_COR,
    ROOTPORT_TOTAL_ERR_FATAL, ROOTPORT_TOTAL_ERR_NONFATAL,
};
use crate::error::Result;
use crate::fs::{entries, SysFs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPortAerCounters {
    pub total_err_cor: u64,
    pub total_err_fatal: u64,
    pub total_err_nonfatal: u64,
}

/// Root port counters keyed by device name, e.g. "0000:00:02.1".
pub type AllRootPortAerCounters = BTreeMap<String, RootPortAerCounters>;

impl SysFs {
    fn rootport_driver_dir(&self) -> PathBuf {
        self.path(["bus", "pci", "drivers", self.rootport_driver()])
    }

    /// Names of the devices bound to the root port driver. Regular files
    /// such as `bind` and `new_id` are skipped.
    pub fn root_port_devices(&self) -> Result<Vec<String>> {
        Ok(entries(&self.rootport_driver_dir())?
            .into_iter()
            .filter(|e| !e.is_regular_file)
            .map(|e| e.name)
            .collect())
    }

    /// Totals for every bound device with AER support. Devices without
    /// aer_rootport_total_err_cor are left out of the map.
    pub fn root_port_aer_counters(&self) -> Result<AllRootPortAerCounters> {
        let driver_dir = self.rootport_driver_dir();
        let mut all = AllRootPortAerCounters::new();

        for name in self.root_port_devices()? {
            match parse_root_port_aer(&driver_dir.join(&name))? {
                Some(counters) => {
                    all.insert(name, counters);
                }
                None => debug!(device = %name, "no root port AER totals, skipping"),
            }
        }
        Ok(all)
    }
}

/// `None` when the device exposes no aer_rootport_total_err_cor. Once it does,
/// the fatal and nonfatal totals are required; blank files count as zero.
pub fn parse_root_port_aer(dir: &Path) -> Result<Option<RootPortAerCounters>> {
    let cor_path = dir.join(ROOTPORT_TOTAL_ERR_COR);
    let Some(cor) = RecordGate::read(&cor_path)? else {
        return Ok(None);
    };

    let required = |file: &str| -> Result<u64> {
        let path = dir.join(file);
        parse_total_value(&path, &Required::read(&path)?)
    };

    Ok(Some(RootPortAerCounters {
        total_err_cor: parse_total_value(&cor_path, &cor)?,
        total_err_fatal: required(ROOTPORT_TOTAL_ERR_FATAL)?,
        total_err_nonfatal: required(ROOTPORT_TOTAL_ERR_NONFATAL)?,
    }))
}
