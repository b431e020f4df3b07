//! Access to a mounted sysfs tree.
//!
//! Every read here is a fresh, blocking read of a pseudo-file; nothing is
//! cached between calls.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::config::SysfsConfig;
use crate::error::{Result, SysfsError};

/// Default sysfs mount point.
pub const SYSFS_PATH: &str = "/sys";

/// Driver the kernel binds to PCIe ports.
pub const DEFAULT_ROOTPORT_DRIVER: &str = "pcieport";

/// Handle on a sysfs tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct SysFs {
    root: PathBuf,
    rootport_driver: String,
}

/// One entry of an enumerated directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_regular_file: bool,
}

impl Default for SysFs {
    fn default() -> Self {
        Self::new(SYSFS_PATH)
    }
}

impl SysFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rootport_driver: DEFAULT_ROOTPORT_DRIVER.to_string(),
        }
    }

    pub fn from_config(config: &SysfsConfig) -> Self {
        Self {
            root: config.sysfs_root.clone(),
            rootport_driver: config.rootport_driver.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rootport_driver(&self) -> &str {
        &self.rootport_driver
    }

    /// Join `components` under the sysfs root.
    pub fn path<I, S>(&self, components: I) -> PathBuf
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut path = self.root.clone();
        for component in components {
            path.push(component);
        }
        path
    }
}

/// Read a pseudo-file and trim it. A missing file yields `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            trace!(path = %path.display(), "file absent");
            Ok(None)
        }
        Err(err) => Err(SysfsError::io(path, err)),
    }
}

/// Read a pseudo-file that must exist and trim it.
pub fn read_required(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|content| content.trim().to_string())
        .map_err(|err| SysfsError::io(path, err))
}

/// List a directory, sorted by entry name.
pub fn entries(dir: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| SysfsError::io(dir, err))? {
        let entry = entry.map_err(|err| SysfsError::io(dir, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| SysfsError::io(entry.path(), err))?;
        out.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_regular_file: file_type.is_file(),
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Read the target of a symlink without following it further.
pub fn resolve_symlink(path: &Path) -> Result<PathBuf> {
    fs::read_link(path).map_err(|source| SysfsError::UnresolvableSymlink {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `path` exists. Errors other than not-found are surfaced.
pub fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SysfsError::io(path, err)),
    }
}

/// Whether `path` is a directory, following symlinks. Missing is `false`.
pub fn is_dir(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(SysfsError::io(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_optional_trims_and_reports_absence() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("numa_node");
        fs::write(&file, "1\n").unwrap();

        assert_eq!(read_optional(&file).unwrap(), Some("1".to_string()));
        assert_eq!(read_optional(&dir.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn test_read_required_missing_is_not_found_error() {
        let dir = tempdir().unwrap();
        let err = read_required(&dir.path().join("class")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_optional_directory_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_optional(dir.path()).unwrap_err();
        assert!(matches!(err, SysfsError::Io { .. }));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_entries_sorted_with_file_kind() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b_dir")).unwrap();
        fs::write(dir.path().join("a_file"), "").unwrap();

        let listed = entries(dir.path()).unwrap();
        assert_eq!(
            listed,
            vec![
                DirEntryInfo {
                    name: "a_file".to_string(),
                    is_regular_file: true
                },
                DirEntryInfo {
                    name: "b_dir".to_string(),
                    is_regular_file: false
                },
            ]
        );
    }

    #[test]
    fn test_resolve_symlink_rejects_plain_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "").unwrap();
        let err = resolve_symlink(&file).unwrap_err();
        assert!(matches!(err, SysfsError::UnresolvableSymlink { .. }));
    }

    #[test]
    fn test_is_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bonding_masters");
        fs::write(&file, "").unwrap();

        assert!(is_dir(dir.path()).unwrap());
        assert!(!is_dir(&file).unwrap());
        assert!(!is_dir(&dir.path().join("missing")).unwrap());
    }

    #[test]
    fn test_path_joins_under_root() {
        let sysfs = SysFs::new("/tmp/fixture");
        assert_eq!(
            sysfs.path(["bus", "pci", "devices"]),
            PathBuf::from("/tmp/fixture/bus/pci/devices")
        );
    }
}
