//! Filesystem transfers between deployment state directories.
//!
//! Every transfer either completes or leaves the tree as it found it. Writes
//! go through a temporary sibling that is renamed into place, and
//! [`place_artifact`] records each side effect so a failed placement can be
//! rolled back in reverse order.

use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

const STAGING_PREFIX: &str = ".lkepm-staging-";

/// What to put at a destination.
#[derive(Debug, Clone, Copy)]
pub enum ArtifactSource<'a> {
    /// Rename the path into place. The source disappears.
    Move(&'a Path),
    /// Duplicate the path into place. The source is left untouched.
    Copy(&'a Path),
    /// Write the bytes as a regular file.
    Bytes(&'a [u8]),
}

/// Outcome of a successful [`place_artifact`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    /// Where the previous occupant of the destination went, if it was kept.
    pub displaced: Option<PathBuf>,
}

/// A side effect of `place_artifact` that can be reverted by renaming back.
#[derive(Debug)]
struct RollbackStep {
    from: PathBuf,
    to: PathBuf,
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn parent_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Hidden scratch directory next to `path`, removed when dropped.
fn staging_dir(path: &Path) -> Result<TempDir, StoreError> {
    let parent = parent_of(path);
    fs::create_dir_all(parent)?;
    Ok(tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)?)
}

/// Rename `src` to `dest`, copying then removing when they sit on different
/// filesystems.
pub fn move_path(src: &Path, dest: &Path) -> Result<(), StoreError> {
    let parent = parent_of(dest);
    fs::create_dir_all(parent)?;
    match fs::rename(src, dest) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!(
                "cross-device move {} -> {}, copying instead",
                src.display(),
                dest.display()
            );
            copy_path(src, dest)?;
            if let Err(e) = remove_path(src) {
                let _ = remove_path(dest);
                return Err(e);
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound && !exists(src) => {
            return Err(StoreError::PathNotFound(src.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    }
    fsync_dir(parent)?;
    Ok(())
}

/// Duplicate a file or directory tree at `dest`.
///
/// The copy is assembled in a hidden sibling and renamed into place, so
/// `dest` never holds a partial tree.
pub fn copy_path(src: &Path, dest: &Path) -> Result<(), StoreError> {
    let meta = match fs::metadata(src) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(StoreError::PathNotFound(src.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let parent = parent_of(dest);
    fs::create_dir_all(parent)?;

    if meta.is_dir() {
        let staging = staging_dir(dest)?;
        let staged = staging.path().join("tree");
        copy_tree(src, &staged)?;
        fs::rename(&staged, dest)?;
    } else {
        let mut tmp = NamedTempFile::new_in(parent)?;
        let mut reader = fs::File::open(src)?;
        io::copy(&mut reader, tmp.as_file_mut())?;
        tmp.as_file().set_permissions(meta.permissions())?;
        tmp.as_file().sync_all()?;
        tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    }
    fsync_dir(parent)?;
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), StoreError> {
    fs::create_dir(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(&from)?, &to)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    fs::set_permissions(dest, fs::metadata(src)?.permissions())?;
    Ok(())
}

fn write_bytes(bytes: &[u8], dest: &Path) -> Result<(), StoreError> {
    let parent = parent_of(dest);
    fs::create_dir_all(parent)?;
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(parent)?;
    Ok(())
}

/// Remove a file, symlink, or directory tree. A missing path is not an error.
pub fn remove_path(path: &Path) -> Result<(), StoreError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// Remove every entry inside `dir`, keeping the directory itself.
/// Returns the number of entries removed. A missing directory purges nothing.
pub fn purge_dir(dir: &Path) -> Result<usize, StoreError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    let mut removed = 0;
    for entry in entries {
        remove_path(&entry?.path())?;
        removed += 1;
    }
    if removed > 0 {
        fsync_dir(dir)?;
    }
    debug!("purged {removed} entries from {}", dir.display());
    Ok(removed)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Undo moves in reverse order. Returns false if any step could not be undone.
fn rollback(steps: Vec<RollbackStep>) -> bool {
    let mut clean = true;
    for step in steps.into_iter().rev() {
        if let Err(e) = fs::rename(&step.from, &step.to) {
            warn!(
                "rollback: failed to move {} back to {}: {e}",
                step.from.display(),
                step.to.display()
            );
            clean = false;
        } else {
            debug!(
                "rollback: restored {} from {}",
                step.to.display(),
                step.from.display()
            );
        }
    }
    clean
}

/// Roll back, keeping staging areas on disk if anything is still parked there.
fn abort(steps: Vec<RollbackStep>, scratch: Vec<TempDir>) {
    if rollback(steps) {
        return;
    }
    for staging in scratch {
        let kept = staging.keep();
        warn!("left staged artifacts in {}", kept.display());
    }
}

/// Put `source` at `dest`, displacing whatever already lives there.
///
/// With `backup`, the previous occupant of `dest` is moved to `backup` and any
/// older artifact at `backup` is discarded. Without it, the occupant is
/// discarded. Discarded artifacts are only removed once the new one is in
/// place; if placing fails, every move is undone and the error is returned.
pub fn place_artifact(
    source: ArtifactSource<'_>,
    dest: &Path,
    backup: Option<&Path>,
) -> Result<Placement, StoreError> {
    if let ArtifactSource::Move(src) | ArtifactSource::Copy(src) = source {
        if !exists(src) {
            return Err(StoreError::PathNotFound(src.to_path_buf()));
        }
        if same_file(src, dest) {
            debug!("{} is already in place", dest.display());
            return Ok(Placement::default());
        }
    }

    let mut steps = Vec::new();
    let mut scratch = Vec::new();
    let mut placement = Placement::default();

    if exists(dest) {
        let displaced = (|| -> Result<(), StoreError> {
            let occupant_target = match backup {
                Some(backup) => {
                    if exists(backup) {
                        let staging = staging_dir(backup)?;
                        let staged = staging.path().join("previous");
                        fs::rename(backup, &staged)?;
                        steps.push(RollbackStep {
                            from: staged,
                            to: backup.to_path_buf(),
                        });
                        scratch.push(staging);
                    }
                    placement.displaced = Some(backup.to_path_buf());
                    backup.to_path_buf()
                }
                None => {
                    let staging = staging_dir(dest)?;
                    let staged = staging.path().join("occupant");
                    scratch.push(staging);
                    staged
                }
            };
            move_path(dest, &occupant_target)?;
            steps.push(RollbackStep {
                from: occupant_target,
                to: dest.to_path_buf(),
            });
            Ok(())
        })();
        if let Err(e) = displaced {
            abort(steps, scratch);
            return Err(e);
        }
    }

    let placed = match source {
        ArtifactSource::Move(src) => move_path(src, dest),
        ArtifactSource::Copy(src) => copy_path(src, dest),
        ArtifactSource::Bytes(bytes) => write_bytes(bytes, dest),
    };
    if let Err(e) = placed {
        warn!("placing {} failed, rolling back: {e}", dest.display());
        abort(steps, scratch);
        return Err(e);
    }

    for staging in scratch {
        let path = staging.path().to_path_buf();
        if let Err(e) = staging.close() {
            warn!("failed to remove staging area {}: {e}", path.display());
        }
    }
    if let Some(displaced) = &placement.displaced {
        debug!(
            "placed {} (previous occupant kept at {})",
            dest.display(),
            displaced.display()
        );
    } else {
        debug!("placed {}", dest.display());
    }
    Ok(placement)
}
