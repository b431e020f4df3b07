//! Configuration for where and how sysfs is read.
//!
//! Config file: /etc/pcictl/config.toml, or an explicit path.
//! `PCICTL_SYSFS_ROOT` overrides the sysfs root after the file is loaded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::fs::{DEFAULT_ROOTPORT_DRIVER, SYSFS_PATH};

pub const SYSFS_ROOT_ENV: &str = "PCICTL_SYSFS_ROOT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysfsConfig {
    /// Mount point of sysfs
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,

    /// Driver whose bound devices are treated as root ports
    #[serde(default = "default_rootport_driver")]
    pub rootport_driver: String,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(SYSFS_PATH)
}

fn default_rootport_driver() -> String {
    DEFAULT_ROOTPORT_DRIVER.to_string()
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            rootport_driver: default_rootport_driver(),
        }
    }
}

impl SysfsConfig {
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/pcictl/config.toml")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. `explicit` path, which must exist
    /// 2. System config (/etc/pcictl/config.toml) if present
    /// 3. Defaults
    ///
    /// The sysfs root from `PCICTL_SYSFS_ROOT` wins over any file value.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let system_path = Self::system_config_path();
                if system_path.exists() {
                    Self::from_file(&system_path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(root) = std::env::var_os(SYSFS_ROOT_ENV) {
            config.sysfs_root = PathBuf::from(root);
        }

        Ok(config)
    }
}
