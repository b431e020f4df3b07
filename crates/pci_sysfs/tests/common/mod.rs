//! Builds sysfs-shaped trees in a temp directory.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use pci_sysfs::SysFs;
use tempfile::{tempdir, TempDir};

pub const CORRECTABLE_NAMES: [&str; 8] = [
    "RxErr",
    "BadTLP",
    "BadDLLP",
    "Rollover",
    "Timeout",
    "NonFatalErr",
    "CorrIntErr",
    "HeaderOF",
];

pub const UNCORRECTABLE_NAMES: [&str; 18] = [
    "Undefined",
    "DLP",
    "SDES",
    "TLP",
    "FCP",
    "CmpltTO",
    "CmpltAbrt",
    "UnxCmplt",
    "RxOF",
    "MalfTLP",
    "ECRC",
    "UnsupReq",
    "ACSViol",
    "UncorrIntErr",
    "BlockedTLP",
    "AtomicOpBlocked",
    "TLPBlockedErr",
    "PoisonTLPBlocked",
];

pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let fixture = Self {
            dir: tempdir().unwrap(),
        };
        fs::create_dir_all(fixture.root().join("bus/pci/devices")).unwrap();
        fs::create_dir_all(fixture.root().join("class/net")).unwrap();
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn sysfs(&self) -> SysFs {
        SysFs::new(self.root())
    }

    /// Create `devices/<chain>` with identity files and link it from
    /// bus/pci/devices the way the kernel does.
    pub fn add_device(&self, chain: &str) -> PathBuf {
        let dir = self.root().join("devices").join(chain);
        fs::create_dir_all(&dir).unwrap();
        for (file, value) in [
            ("class", "0x020000"),
            ("vendor", "0x8086"),
            ("device", "0x1521"),
            ("subsystem_vendor", "0x8086"),
            ("subsystem_device", "0x0001"),
            ("revision", "0x01"),
        ] {
            write(&dir, file, value);
        }

        let name = chain.rsplit('/').next().unwrap();
        symlink(
            format!("../../../devices/{chain}"),
            self.root().join("bus/pci/devices").join(name),
        )
        .unwrap();
        dir
    }

    /// Link `devices/<chain>` under bus/pci/drivers/<driver>.
    pub fn bind_driver(&self, driver: &str, chain: &str) {
        let driver_dir = self.root().join("bus/pci/drivers").join(driver);
        fs::create_dir_all(&driver_dir).unwrap();
        for file in ["bind", "unbind", "new_id", "remove_id", "uevent"] {
            write(&driver_dir, file, "");
        }
        let name = chain.rsplit('/').next().unwrap();
        symlink(
            format!("../../../../devices/{chain}"),
            driver_dir.join(name),
        )
        .unwrap();
    }

    /// Add /sys/class/net/<name>, optionally backed by `devices/<chain>`.
    pub fn add_iface(&self, name: &str, chain: Option<&str>) -> PathBuf {
        let dir = self.root().join("class/net").join(name);
        fs::create_dir_all(&dir).unwrap();
        write(&dir, "operstate", "up");
        if let Some(chain) = chain {
            symlink(self.root().join("devices").join(chain), dir.join("device")).unwrap();
        }
        dir
    }
}

pub fn write(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), format!("{content}\n")).unwrap();
}

/// Counter table with sequential values starting at `first`.
pub fn counter_table(names: &[&str], first: u64) -> String {
    names
        .iter()
        .zip(first..)
        .map(|(name, value)| format!("{name} {value}\n"))
        .collect()
}

/// Correctable 1..8, fatal 9..26, nonfatal 27..44.
pub fn write_device_aer(dir: &Path) {
    fs::write(
        dir.join("aer_dev_correctable"),
        counter_table(&CORRECTABLE_NAMES, 1) + "TOTAL_ERR_COR 36\n",
    )
    .unwrap();
    fs::write(
        dir.join("aer_dev_fatal"),
        counter_table(&UNCORRECTABLE_NAMES, 9) + "TOTAL_ERR_FATAL 315\n",
    )
    .unwrap();
    fs::write(
        dir.join("aer_dev_nonfatal"),
        counter_table(&UNCORRECTABLE_NAMES, 27) + "TOTAL_ERR_NONFATAL 639\n",
    )
    .unwrap();
}

pub fn write_root_port_totals(dir: &Path, cor: u64, fatal: u64, nonfatal: u64) {
    write(dir, "aer_rootport_total_err_cor", &cor.to_string());
    write(dir, "aer_rootport_total_err_fatal", &fatal.to_string());
    write(dir, "aer_rootport_total_err_nonfatal", &nonfatal.to_string());
}
