use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::trace;

/// Exclusive advisory lock over the deployment directories.
///
/// Held for the whole of a mutating operation, purges included; released on
/// drop. The lock file itself is created once, when the layout is
/// initialized, so taking the lock never adds entries to the tree.
#[derive(Debug)]
pub struct DeploymentLock {
    lock_file: File,
    path: PathBuf,
}

impl DeploymentLock {
    /// Block until the lock is held.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(lock_path)
            .map_err(|e| CoreError::Lock(format!("{}: {e}", lock_path.display())))?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Lock(format!("{}: {e}", lock_path.display())))?;
        trace!("acquired {}", lock_path.display());
        Ok(Self {
            lock_file: file,
            path: lock_path.to_path_buf(),
        })
    }
}

impl Drop for DeploymentLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
        trace!("released {}", self.path.display());
    }
}
