//! Deployment directories and filesystem transfers for lkepm.
//!
//! This crate owns everything that touches the state directories: the
//! `DeploymentState` enum, `DeploymentLayout` for resolving each state to a
//! directory (with optional host-root discovery), bare file-name validation,
//! and the `transfer` primitives that move, copy, replace, and purge package
//! artifacts without ever leaving a half-applied transition behind.

pub mod layout;
pub mod transfer;

pub use layout::{
    discover_host_root, validate_file_name, DeploymentLayout, DeploymentState, HOST_MARKERS,
};
pub use transfer::{
    copy_path, move_path, place_artifact, purge_dir, remove_path, ArtifactSource, Placement,
};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("the path '{}' does not exist", .0.display())]
    PathNotFound(PathBuf),
    #[error("the {0} directory requires a discovered host root")]
    HostRootRequired(DeploymentState),
    #[error("the file name '{0}' is not valid, use a bare file name without any folder path")]
    InvalidFileName(String),
}
