//! Error types for sysfs PCI and AER reads.

use std::path::PathBuf;

use thiserror::Error;

use crate::location::PciLocation;

pub type Result<T> = std::result::Result<T, SysfsError>;

#[derive(Error, Debug)]
pub enum SysfsError {
    #[error("invalid PCI location '{text}': {reason}")]
    MalformedLocation { text: String, reason: String },

    #[error("cannot resolve symlink {path:?}")]
    UnresolvableSymlink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown unit for {attribute} {value:?} in {path:?}")]
    UnknownUnit {
        attribute: &'static str,
        value: String,
        path: PathBuf,
    },

    #[error("unexpected number of fields in {path:?}: {line:?}")]
    MalformedCounterLine { path: PathBuf, line: String },

    #[error("failed to parse {value:?} from {path:?}: {reason}")]
    NumericParse {
        path: PathBuf,
        value: String,
        reason: String,
    },

    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network interface {name:?} not found")]
    InterfaceNotFound { name: String },

    #[error("PCI device {location}")]
    Device {
        location: PciLocation,
        #[source]
        source: Box<SysfsError>,
    },
}

impl SysfsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SysfsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn numeric(
        path: impl Into<PathBuf>,
        value: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        SysfsError::NumericParse {
            path: path.into(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach the owning device location to a per-device failure.
    pub(crate) fn for_device(self, location: PciLocation) -> Self {
        SysfsError::Device {
            location,
            source: Box::new(self),
        }
    }

    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        match self {
            SysfsError::Io { source, .. } | SysfsError::UnresolvableSymlink { source, .. } => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            SysfsError::Device { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
