use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};

/// Subdirectories a host root must contain to be accepted.
pub const HOST_MARKERS: [&str; 2] = ["data", "system"];

const DISABLED_DIR: &str = ".disabled";
const RECYCLE_BIN_DIR: &str = ".recyclebin";
const LOCK_FILE: &str = ".lkepm.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentState {
    /// Read-only catalog of bundled packages. Requires a host root.
    Available,
    /// The running manager's own package root.
    Deployed,
    Enabled,
    Disabled,
    /// Removed but recoverable; holds at most one previous version per name.
    RecycleBin,
}

impl DeploymentState {
    pub const ALL: [DeploymentState; 5] = [
        DeploymentState::Available,
        DeploymentState::Deployed,
        DeploymentState::Enabled,
        DeploymentState::Disabled,
        DeploymentState::RecycleBin,
    ];
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentState::Available => write!(f, "available"),
            DeploymentState::Deployed => write!(f, "deployed"),
            DeploymentState::Enabled => write!(f, "enabled"),
            DeploymentState::Disabled => write!(f, "disabled"),
            DeploymentState::RecycleBin => write!(f, "recyclebin"),
        }
    }
}

impl FromStr for DeploymentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(DeploymentState::Available),
            "deployed" => Ok(DeploymentState::Deployed),
            "enabled" | "" => Ok(DeploymentState::Enabled),
            "disabled" => Ok(DeploymentState::Disabled),
            "recyclebin" | "recycle-bin" | "backup" | "backedup" => {
                Ok(DeploymentState::RecycleBin)
            }
            other => Err(format!(
                "unknown deployment state '{other}', expected one of: available, deployed, enabled, disabled, recyclebin"
            )),
        }
    }
}

/// Reject anything that is not a bare file name.
///
/// Separators, `..` anywhere in the name, NUL bytes, and leading dots (the
/// bookkeeping directories inside a state directory) are all refused.
pub fn validate_file_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if invalid {
        return Err(StoreError::InvalidFileName(name.to_owned()));
    }
    Ok(())
}

/// Probe host-root candidates in order.
///
/// A candidate is accepted when every [`HOST_MARKERS`] subdirectory exists and
/// the real path of its `data` directory is the real parent of the deployed
/// package, which rules out a look-alike tree reached through symlinks.
pub fn discover_host_root(deployed: &Path, candidates: &[PathBuf]) -> Option<PathBuf> {
    let deployed_parent = fs::canonicalize(deployed).ok()?.parent()?.to_path_buf();

    for candidate in candidates {
        if !HOST_MARKERS.iter().all(|m| candidate.join(m).is_dir()) {
            trace!("host root candidate {} lacks markers", candidate.display());
            continue;
        }
        match fs::canonicalize(candidate.join(HOST_MARKERS[0])) {
            Ok(data) if data == deployed_parent => {
                let root = fs::canonicalize(candidate).unwrap_or_else(|_| candidate.clone());
                debug!("discovered host root {}", root.display());
                return Some(root);
            }
            Ok(data) => trace!(
                "host root candidate {} does not contain the deployed package ({} != {})",
                candidate.display(),
                data.display(),
                deployed_parent.display()
            ),
            Err(e) => trace!("host root candidate {}: {e}", candidate.display()),
        }
    }
    None
}

/// Directory layout of every deployment state.
///
/// With a host root `R`:
///
/// ```text
/// R/data/plugins              enabled
/// R/data/plugins/.disabled    disabled
/// R/data/plugins/.recyclebin  recycle bin
/// R/data/logs/plugins         per-instance logs
/// R/system/plugins            available catalog
/// ```
///
/// Without one, the same shape is resolved relative to the deployed package,
/// whose parent stands in for `R/data`, and the available catalog is
/// unreachable.
#[derive(Debug, Clone)]
pub struct DeploymentLayout {
    deployed: PathBuf,
    data: PathBuf,
    host_root: Option<PathBuf>,
}

impl DeploymentLayout {
    pub fn new(deployed: impl Into<PathBuf>, host_root: Option<PathBuf>) -> Self {
        let deployed = deployed.into();
        let data = match &host_root {
            Some(root) => root.join(HOST_MARKERS[0]),
            None => deployed.join(".."),
        };
        Self {
            deployed,
            data,
            host_root,
        }
    }

    /// Build a layout, discovering the host root among `candidates`.
    pub fn discover(deployed: impl Into<PathBuf>, candidates: &[PathBuf]) -> Self {
        let deployed = deployed.into();
        let deployed = fs::canonicalize(&deployed).unwrap_or(deployed);
        let host_root = discover_host_root(&deployed, candidates);
        if host_root.is_none() {
            debug!(
                "no host root found, resolving states relative to {}",
                deployed.display()
            );
        }
        Self::new(deployed, host_root)
    }

    #[inline]
    pub fn host_root(&self) -> Option<&Path> {
        self.host_root.as_deref()
    }

    #[inline]
    pub fn deployed_dir(&self) -> &Path {
        &self.deployed
    }

    #[inline]
    pub fn enabled_dir(&self) -> PathBuf {
        self.data.join("plugins")
    }

    #[inline]
    pub fn disabled_dir(&self) -> PathBuf {
        self.enabled_dir().join(DISABLED_DIR)
    }

    #[inline]
    pub fn recycle_bin_dir(&self) -> PathBuf {
        self.enabled_dir().join(RECYCLE_BIN_DIR)
    }

    pub fn available_dir(&self) -> Result<PathBuf, StoreError> {
        self.host_root
            .as_ref()
            .map(|root| root.join(HOST_MARKERS[1]).join("plugins"))
            .ok_or(StoreError::HostRootRequired(DeploymentState::Available))
    }

    #[inline]
    pub fn logs_dir(&self) -> PathBuf {
        self.data.join("logs").join("plugins")
    }

    /// Advisory lock file serializing every mutation of the state directories.
    #[inline]
    pub fn lock_file(&self) -> PathBuf {
        self.enabled_dir().join(LOCK_FILE)
    }

    pub fn state_dir(&self, state: DeploymentState) -> Result<PathBuf, StoreError> {
        match state {
            DeploymentState::Available => self.available_dir(),
            DeploymentState::Deployed => Ok(self.deployed.clone()),
            DeploymentState::Enabled => Ok(self.enabled_dir()),
            DeploymentState::Disabled => Ok(self.disabled_dir()),
            DeploymentState::RecycleBin => Ok(self.recycle_bin_dir()),
        }
    }

    /// Path of a named artifact inside a state directory. The name is
    /// validated before any path is built.
    pub fn artifact_path(&self, state: DeploymentState, name: &str) -> Result<PathBuf, StoreError> {
        validate_file_name(name)?;
        Ok(self.state_dir(state)?.join(name))
    }

    pub fn log_file(&self, instance: &str) -> Result<PathBuf, StoreError> {
        validate_file_name(instance)?;
        Ok(self.logs_dir().join(format!("{instance}.log")))
    }

    /// Open an instance's log file for reading. The handle closes on drop.
    pub fn open_log(&self, instance: &str) -> Result<File, StoreError> {
        let path = self.log_file(instance)?;
        match File::open(&path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::PathNotFound(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create the writable state directories and the lock file.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.enabled_dir())?;
        fs::create_dir_all(self.disabled_dir())?;
        fs::create_dir_all(self.recycle_bin_dir())?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.lock_file())?;
        Ok(())
    }
}
