//! PCIe Advanced Error Reporting counters.
//!
//! Sources, under a device directory:
//! - aer_dev_correctable, aer_dev_fatal, aer_dev_nonfatal: one `<Name> <count>` per line
//! - aer_rootport_total_err_{cor,fatal,nonfatal}: a single count, root ports only
//!
//! The same parser serves /sys/bus/pci/devices/<location>,
//! /sys/bus/pci/drivers/pcieport/<device> and /sys/class/net/<iface>/device.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::device::PciDevice;
use crate::error::{Result, SysfsError};
use crate::fs::{read_optional, read_required, SysFs};
use crate::location::PciLocation;
use crate::scan::PCI_DEVICES_PATH;

pub(crate) const CORRECTABLE_FILE: &str = "aer_dev_correctable";
pub(crate) const ROOTPORT_TOTAL_ERR_COR: &str = "aer_rootport_total_err_cor";
pub(crate) const ROOTPORT_TOTAL_ERR_FATAL: &str = "aer_rootport_total_err_fatal";
pub(crate) const ROOTPORT_TOTAL_ERR_NONFATAL: &str = "aer_rootport_total_err_nonfatal";

/// How a missing counter file is handled.
pub(crate) trait Presence {
    type Value;

    fn read(path: &Path) -> Result<Self::Value>;
}

/// Missing file is an error.
pub(crate) struct Required;

/// Missing or blank file leaves the value absent.
pub(crate) struct Optional;

/// Missing file means the whole record does not exist.
pub(crate) struct RecordGate;

impl Presence for Required {
    type Value = String;

    fn read(path: &Path) -> Result<String> {
        read_required(path)
    }
}

impl Presence for Optional {
    type Value = Option<String>;

    fn read(path: &Path) -> Result<Option<String>> {
        Ok(read_optional(path)?.filter(|v| !v.is_empty()))
    }
}

impl Presence for RecordGate {
    type Value = Option<String>;

    fn read(path: &Path) -> Result<Option<String>> {
        let value = read_optional(path)?;
        if value.is_none() {
            trace!(path = %path.display(), "record not present");
        }
        Ok(value)
    }
}

/// Counter struct filled from a `<Name> <count>` table.
pub trait CounterTable: Default {
    /// Kernel counter names, in file order.
    const NAMES: &'static [&'static str];

    /// Field for a kernel counter name, `None` for names this table does not track.
    fn counter_mut(&mut self, name: &str) -> Option<&mut u64>;

    /// Decode a counter file. Unknown names are skipped; a repeated name
    /// keeps the last value.
    fn parse_table(path: &Path, text: &str) -> Result<Self> {
        let mut counters = Self::default();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[name, value] = fields.as_slice() else {
                return Err(SysfsError::MalformedCounterLine {
                    path: path.to_path_buf(),
                    line: line.to_string(),
                });
            };
            let value: u64 = value
                .parse()
                .map_err(|e| SysfsError::numeric(path, value, e))?;

            if let Some(field) = counters.counter_mut(name) {
                *field = value;
            }
        }
        Ok(counters)
    }
}

macro_rules! counter_table {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$fmeta:meta])* $field:ident => $label:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: u64,)*
        }

        impl CounterTable for $name {
            const NAMES: &'static [&'static str] = &[$($label),*];

            fn counter_mut(&mut self, name: &str) -> Option<&mut u64> {
                match name {
                    $($label => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

counter_table! {
    /// Values from aer_dev_correctable.
    pub struct CorrectableAerCounters {
        rx_err => "RxErr",
        bad_tlp => "BadTLP",
        bad_dllp => "BadDLLP",
        rollover => "Rollover",
        timeout => "Timeout",
        non_fatal_err => "NonFatalErr",
        corr_int_err => "CorrIntErr",
        header_of => "HeaderOF",
    }
}

counter_table! {
    /// Values from aer_dev_fatal or aer_dev_nonfatal.
    pub struct UncorrectableAerCounters {
        undefined => "Undefined",
        dlp => "DLP",
        sdes => "SDES",
        tlp => "TLP",
        fcp => "FCP",
        cmplt_to => "CmpltTO",
        cmplt_abrt => "CmpltAbrt",
        unx_cmplt => "UnxCmplt",
        rx_of => "RxOF",
        malf_tlp => "MalfTLP",
        ecrc => "ECRC",
        unsup_req => "UnsupReq",
        acs_viol => "ACSViol",
        uncorr_int_err => "UncorrIntErr",
        blocked_tlp => "BlockedTLP",
        atomic_op_blocked => "AtomicOpBlocked",
        tlp_blocked_err => "TLPBlockedErr",
        poison_tlp_blocked => "PoisonTLPBlocked",
    }
}

/// Uncorrectable severity, selecting aer_dev_fatal or aer_dev_nonfatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    NonFatal,
}

impl Severity {
    pub fn file_name(self) -> &'static str {
        match self {
            Severity::Fatal => "aer_dev_fatal",
            Severity::NonFatal => "aer_dev_nonfatal",
        }
    }
}

/// Root port totals read per device; each may be missing independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootPortTotals {
    pub total_err_cor: Option<u64>,
    pub total_err_fatal: Option<u64>,
    pub total_err_nonfatal: Option<u64>,
}

/// One AER snapshot of a device directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAerCounters {
    pub correctable: CorrectableAerCounters,
    pub fatal: UncorrectableAerCounters,
    pub non_fatal: UncorrectableAerCounters,
    pub root_port_total_err_cor: Option<u64>,
    pub root_port_total_err_fatal: Option<u64>,
    pub root_port_total_err_nonfatal: Option<u64>,
}

/// A single total. Blank counts as zero.
pub(crate) fn parse_total_value(path: &Path, text: &str) -> Result<u64> {
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<u64>().map_err(|e| SysfsError::numeric(path, text, e))
}

/// Parse aer_dev_correctable, which must exist.
pub fn parse_correctable(dir: &Path) -> Result<CorrectableAerCounters> {
    let path = dir.join(CORRECTABLE_FILE);
    CorrectableAerCounters::parse_table(&path, &Required::read(&path)?)
}

/// Parse aer_dev_fatal or aer_dev_nonfatal, which must exist.
pub fn parse_uncorrectable(dir: &Path, severity: Severity) -> Result<UncorrectableAerCounters> {
    let path = dir.join(severity.file_name());
    UncorrectableAerCounters::parse_table(&path, &Required::read(&path)?)
}

/// Parse the three aer_rootport_total_err_* files, each optional.
pub fn parse_root_port_totals(dir: &Path) -> Result<RootPortTotals> {
    let total = |file: &str| -> Result<Option<u64>> {
        let path = dir.join(file);
        Optional::read(&path)?
            .map(|text| parse_total_value(&path, &text))
            .transpose()
    };

    Ok(RootPortTotals {
        total_err_cor: total(ROOTPORT_TOTAL_ERR_COR)?,
        total_err_fatal: total(ROOTPORT_TOTAL_ERR_FATAL)?,
        total_err_nonfatal: total(ROOTPORT_TOTAL_ERR_NONFATAL)?,
    })
}

/// Parse every AER file of one device directory.
///
/// Returns `None` when aer_dev_correctable is missing, i.e. the device has no
/// AER capability. Once it exists, both uncorrectable files are required.
pub fn parse_device_aer(dir: &Path) -> Result<Option<DeviceAerCounters>> {
    let correctable_path = dir.join(CORRECTABLE_FILE);
    let Some(text) = RecordGate::read(&correctable_path)? else {
        return Ok(None);
    };
    let correctable = CorrectableAerCounters::parse_table(&correctable_path, &text)?;

    let fatal = parse_uncorrectable(dir, Severity::Fatal)?;
    let non_fatal = parse_uncorrectable(dir, Severity::NonFatal)?;
    let totals = parse_root_port_totals(dir)?;

    Ok(Some(DeviceAerCounters {
        correctable,
        fatal,
        non_fatal,
        root_port_total_err_cor: totals.total_err_cor,
        root_port_total_err_fatal: totals.total_err_fatal,
        root_port_total_err_nonfatal: totals.total_err_nonfatal,
    }))
}

impl SysFs {
    /// AER counters of the device at `location`, `None` without AER support.
    pub fn pci_device_aer(&self, location: &PciLocation) -> Result<Option<DeviceAerCounters>> {
        let dir = self.path(PCI_DEVICES_PATH).join(location.directory_name());
        parse_device_aer(&dir).map_err(|e| e.for_device(*location))
    }
}

impl PciDevice {
    pub fn aer_counters(&self, sysfs: &SysFs) -> Result<Option<DeviceAerCounters>> {
        sysfs.pci_device_aer(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const CORRECTABLE: &str = "RxErr 1\nBadTLP 2\nBadDLLP 3\nRollover 4\nTimeout 5\n\
                               NonFatalErr 6\nCorrIntErr 7\nHeaderOF 8\nTOTAL_ERR_COR 36\n";

    #[test]
    fn test_correctable_table() {
        let got = CorrectableAerCounters::parse_table(Path::new("x"), CORRECTABLE).unwrap();
        assert_eq!(
            got,
            CorrectableAerCounters {
                rx_err: 1,
                bad_tlp: 2,
                bad_dllp: 3,
                rollover: 4,
                timeout: 5,
                non_fatal_err: 6,
                corr_int_err: 7,
                header_of: 8,
            }
        );
    }

    #[test]
    fn test_unknown_counter_ignored() {
        let got =
            CorrectableAerCounters::parse_table(Path::new("x"), "FooBar 99\nRxErr 3\n").unwrap();
        assert_eq!(got.rx_err, 3);
        assert_eq!(
            got,
            CorrectableAerCounters {
                rx_err: 3,
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_duplicate_counter_last_wins() {
        let got = UncorrectableAerCounters::parse_table(Path::new("x"), "DLP 1\nDLP 7\n").unwrap();
        assert_eq!(got.dlp, 7);
    }

    #[test]
    fn test_trailing_blank_lines() {
        let got = UncorrectableAerCounters::parse_table(Path::new("x"), "ECRC 5\n\n\n").unwrap();
        assert_eq!(got.ecrc, 5);
    }

    #[test]
    fn test_malformed_line() {
        let err = CorrectableAerCounters::parse_table(Path::new("x"), "RxErr 1 2\n").unwrap_err();
        assert!(matches!(err, SysfsError::MalformedCounterLine { .. }));

        let err = CorrectableAerCounters::parse_table(Path::new("x"), "RxErr\n").unwrap_err();
        assert!(matches!(err, SysfsError::MalformedCounterLine { .. }));
    }

    #[test]
    fn test_non_numeric_value() {
        let err = CorrectableAerCounters::parse_table(Path::new("x"), "RxErr many\n").unwrap_err();
        assert!(matches!(err, SysfsError::NumericParse { .. }));
    }

    #[test]
    fn test_all_uncorrectable_names_mapped() {
        assert_eq!(UncorrectableAerCounters::NAMES.len(), 18);
        assert_eq!(CorrectableAerCounters::NAMES.len(), 8);
        let mut counters = UncorrectableAerCounters::default();
        for name in UncorrectableAerCounters::NAMES {
            *counters.counter_mut(name).unwrap() += 1;
        }
        assert_eq!(counters.poison_tlp_blocked, 1);
        assert_eq!(counters.counter_mut("TOTAL_ERR_FATAL"), None);
    }

    #[test]
    fn test_presence_policies() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let blank: PathBuf = dir.path().join("blank");
        fs::write(&blank, "\n").unwrap();

        assert!(Required::read(&missing).unwrap_err().is_not_found());
        assert_eq!(Required::read(&blank).unwrap(), "");
        assert_eq!(Optional::read(&missing).unwrap(), None);
        assert_eq!(Optional::read(&blank).unwrap(), None);
        assert_eq!(RecordGate::read(&missing).unwrap(), None);
        assert_eq!(RecordGate::read(&blank).unwrap(), Some(String::new()));
    }

    #[test]
    fn test_blank_correctable_file_is_empty_record() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CORRECTABLE_FILE), "\n").unwrap();
        fs::write(dir.path().join("aer_dev_fatal"), "\n").unwrap();
        fs::write(dir.path().join("aer_dev_nonfatal"), "\n").unwrap();

        assert_eq!(
            parse_device_aer(dir.path()).unwrap(),
            Some(DeviceAerCounters::default())
        );
    }

    #[test]
    fn test_device_without_aer() {
        let dir = tempdir().unwrap();
        assert_eq!(parse_device_aer(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_missing_fatal_file_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CORRECTABLE_FILE), CORRECTABLE).unwrap();
        fs::write(dir.path().join("aer_dev_nonfatal"), "DLP 1\n").unwrap();

        let err = parse_device_aer(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_blank_root_port_total_is_absent() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(ROOTPORT_TOTAL_ERR_COR), "\n").unwrap();
        fs::write(dir.path().join(ROOTPORT_TOTAL_ERR_FATAL), "2\n").unwrap();

        let totals = parse_root_port_totals(dir.path()).unwrap();
        assert_eq!(
            totals,
            RootPortTotals {
                total_err_cor: None,
                total_err_fatal: Some(2),
                total_err_nonfatal: None,
            }
        );
    }

    #[test]
    fn test_bad_root_port_total_is_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(ROOTPORT_TOTAL_ERR_NONFATAL), "x\n").unwrap();
        assert!(parse_root_port_totals(dir.path()).is_err());
    }
}
