use crate::concurrency::DeploymentLock;
use crate::config::{ManagerConfig, RestoreMode};
use crate::lifecycle::{validate_transition, Occupant, Operation, TransferKind, Transition};
use crate::CoreError;
use lkepm_parser::{parse_source, PackageSource};
use lkepm_schema::{is_artifact_file_name, ArtifactName, Manifest};
use lkepm_store::{
    copy_path, move_path, place_artifact, purge_dir, validate_file_name, ArtifactSource,
    DeploymentLayout, DeploymentState, Placement,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RESTORE_STAGING_PREFIX: &str = ".lkepm-restore-";
const UPLOAD_SPOOL_PREFIX: &str = ".lkepm-upload-";

/// Parse a package at `path` and require a usable identity.
fn read_valid_manifest(path: &Path) -> Result<Manifest, CoreError> {
    let manifest = parse_source(path)?;
    manifest.validate()?;
    Ok(manifest)
}

fn artifact_source(transfer: TransferKind, path: &Path) -> ArtifactSource<'_> {
    match transfer {
        TransferKind::Move => ArtifactSource::Move(path),
        TransferKind::Copy => ArtifactSource::Copy(path),
    }
}

/// Moves plugin packages between deployment states.
///
/// Holds the manifest of the package it runs from; any operation whose
/// target resolves to that same package fails with
/// [`CoreError::InvalidSelfAction`] before anything on disk changes.
pub struct PluginManager {
    layout: DeploymentLayout,
    restore_mode: RestoreMode,
    self_manifest: Manifest,
}

impl PluginManager {
    /// Resolve the layout from `config` and initialize.
    pub fn open(config: &ManagerConfig) -> Result<Self, CoreError> {
        Self::initialize(config.layout(), config.restore_mode)
    }

    /// Create the writable state directories and parse the manager's own
    /// package. Failing to parse it is fatal.
    pub fn initialize(layout: DeploymentLayout, restore_mode: RestoreMode) -> Result<Self, CoreError> {
        layout.initialize()?;
        let self_manifest = read_valid_manifest(layout.deployed_dir())?;
        info!(
            "plugin manager {} v{} at {}",
            self_manifest.name,
            self_manifest.version,
            layout.deployed_dir().display()
        );
        match layout.host_root() {
            Some(root) => debug!("host root: {}", root.display()),
            None => debug!("no host root, available catalog disabled"),
        }
        Ok(Self {
            layout,
            restore_mode,
            self_manifest,
        })
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub fn restore_mode(&self) -> RestoreMode {
        self.restore_mode
    }

    /// Manifest of the package this manager runs from.
    pub fn get_manifest(&self) -> &Manifest {
        &self.self_manifest
    }

    /// Every valid package in a state directory, keyed by file name.
    ///
    /// `*.lke` files and directories are listed; the deployed directory lists
    /// every visible entry. Entries that fail to parse are skipped with a
    /// warning. A state directory that does not exist yet lists nothing.
    pub fn list_packages(
        &self,
        state: DeploymentState,
    ) -> Result<BTreeMap<String, Manifest>, CoreError> {
        let dir = self.layout.state_dir(state)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        let mut packages = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!("skipping non UTF-8 entry {}", entry.path().display());
                continue;
            };
            let listed = match state {
                DeploymentState::Deployed => !file_name.starts_with('.'),
                _ => is_artifact_file_name(&file_name),
            };
            if !listed {
                continue;
            }
            match read_valid_manifest(&entry.path()) {
                Ok(manifest) => {
                    packages.insert(file_name, manifest);
                }
                Err(e) => warn!("found {file_name} but it's not a valid plugin: {e}"),
            }
        }
        debug!("{} packages in the {state} directory", packages.len());
        Ok(packages)
    }

    /// Manifest of one enabled package.
    pub fn inspect(&self, file_name: &str) -> Result<Manifest, CoreError> {
        let path = self
            .layout
            .artifact_path(DeploymentState::Enabled, file_name)?;
        read_valid_manifest(&path)
    }

    /// Install a package under its normalized name in the enabled directory.
    ///
    /// A path source is copied and left in place. A stream is spooled to a
    /// hidden file next to its destination, parsed from there, and moved into
    /// place, so it is never held in memory. Returns the artifact name.
    pub fn install(&self, source: PackageSource) -> Result<ArtifactName, CoreError> {
        match source {
            PackageSource::Path(path) => self.install_path(Operation::Install, &path),
            PackageSource::Buffer(bytes) => self.install_bytes(&bytes),
            PackageSource::Stream(mut reader) => {
                let mut spool = tempfile::Builder::new()
                    .prefix(UPLOAD_SPOOL_PREFIX)
                    .tempfile_in(self.layout.enabled_dir())?;
                let written = io::copy(&mut reader, &mut spool)?;
                spool.as_file().sync_all()?;
                debug!("spooled {written} streamed bytes to {}", spool.path().display());
                // Removed on drop unless the move below consumed it.
                let spooled = spool.into_temp_path();
                self.install_path(Operation::Upload, &spooled)
            }
        }
    }

    /// Install a temporary upload, moving it into place.
    pub fn install_upload(&self, temp_file: &Path) -> Result<ArtifactName, CoreError> {
        self.install_path(Operation::Upload, temp_file)
    }

    fn install_path(&self, op: Operation, path: &Path) -> Result<ArtifactName, CoreError> {
        let manifest = read_valid_manifest(path)?;
        let transfer = op.transition(self.restore_mode).transfer;
        self.place_package(op, &manifest, artifact_source(transfer, path))
    }

    fn install_bytes(&self, bytes: &[u8]) -> Result<ArtifactName, CoreError> {
        let manifest = parse_source(bytes.to_vec())?;
        manifest.validate()?;
        self.place_package(Operation::Install, &manifest, ArtifactSource::Bytes(bytes))
    }

    /// Copy a bundled package out of the available catalog.
    ///
    /// `name` matches either a catalog file name or a plugin name, with or
    /// without the canonical prefix. Zero or several matches are
    /// [`CoreError::PackageNotFound`].
    pub fn install_from_catalog(&self, name: &str) -> Result<ArtifactName, CoreError> {
        validate_file_name(name)?;
        let catalog = self.list_packages(DeploymentState::Available)?;
        let wanted = Manifest::new(name, "").canonical_name();

        let matches: Vec<(&String, &Manifest)> = catalog
            .iter()
            .filter(|(file, manifest)| file.as_str() == name || manifest.canonical_name() == wanted)
            .collect();
        let (file_name, manifest) = match matches.as_slice() {
            [found] => *found,
            [] => return Err(CoreError::PackageNotFound(name.to_owned())),
            several => {
                warn!(
                    "'{name}' is ambiguous in the catalog: {}",
                    several
                        .iter()
                        .map(|(file, _)| file.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                return Err(CoreError::PackageNotFound(name.to_owned()));
            }
        };

        let src = self
            .layout
            .artifact_path(DeploymentState::Available, file_name)?;
        self.place_package(
            Operation::InstallAvailable,
            manifest,
            ArtifactSource::Copy(&src),
        )
    }

    fn place_package(
        &self,
        op: Operation,
        manifest: &Manifest,
        source: ArtifactSource<'_>,
    ) -> Result<ArtifactName, CoreError> {
        self.ensure_not_self(manifest)?;
        let name = manifest.normalized_name();
        let _lock = self.lock()?;
        self.apply(op.transition(self.restore_mode), source, name.as_str())?;
        info!("{op}: {name} enabled");
        Ok(name)
    }

    pub fn disable(&self, file_name: &str) -> Result<(), CoreError> {
        self.relocate(Operation::Disable, file_name)
    }

    pub fn enable(&self, file_name: &str) -> Result<(), CoreError> {
        self.relocate(Operation::Enable, file_name)
    }

    /// Move an enabled package to the recycle bin, replacing any previous
    /// version kept there.
    pub fn delete(&self, file_name: &str) -> Result<(), CoreError> {
        self.relocate(Operation::Delete, file_name)
    }

    /// Bring a recycle-bin package back into the enabled directory.
    ///
    /// The artifact is staged (copied or moved, per [`RestoreMode`]) next to
    /// the enabled directory first, so when the name is already enabled the
    /// current version swaps places with the restored one.
    pub fn restore(&self, file_name: &str) -> Result<(), CoreError> {
        let op = Operation::Restore;
        let transition = op.transition(self.restore_mode);
        let (src, _lock) = self.checked_source(transition, file_name)?;

        let staging = tempfile::Builder::new()
            .prefix(RESTORE_STAGING_PREFIX)
            .tempdir_in(self.layout.enabled_dir())?;
        let staged = staging.path().join(file_name);
        match transition.transfer {
            TransferKind::Copy => copy_path(&src, &staged)?,
            TransferKind::Move => move_path(&src, &staged)?,
        }

        match self.apply(transition, ArtifactSource::Move(&staged), file_name) {
            Ok(_) => {
                info!("{op}: {file_name} ({} from the recycle bin)", self.restore_mode);
                Ok(())
            }
            Err(e) => {
                if transition.transfer == TransferKind::Move && !src.exists() {
                    if let Err(undo) = move_path(&staged, &src) {
                        warn!("failed to return {file_name} to the recycle bin: {undo}");
                    }
                }
                Err(e)
            }
        }
    }

    fn relocate(&self, op: Operation, file_name: &str) -> Result<(), CoreError> {
        let transition = op.transition(self.restore_mode);
        let (src, _lock) = self.checked_source(transition, file_name)?;
        self.apply(transition, artifact_source(transition.transfer, &src), file_name)?;
        info!(
            "{op}: {file_name} moved to the {} directory",
            transition.to
        );
        Ok(())
    }

    /// Validate the name, take the deployment lock, and parse the artifact in
    /// the source state. Fails before any mutation if the artifact is the
    /// manager itself.
    fn checked_source(
        &self,
        transition: Transition,
        file_name: &str,
    ) -> Result<(PathBuf, DeploymentLock), CoreError> {
        validate_file_name(file_name)?;
        let Some(from) = transition.from else {
            return Err(CoreError::InvalidTransition {
                from: "external".to_owned(),
                to: transition.to.to_string(),
            });
        };
        validate_transition(from, transition.to)?;

        let lock = self.lock()?;
        let src = self.layout.artifact_path(from, file_name)?;
        let manifest = read_valid_manifest(&src)?;
        self.ensure_not_self(&manifest)?;
        Ok((src, lock))
    }

    fn apply(
        &self,
        transition: Transition,
        source: ArtifactSource<'_>,
        file_name: &str,
    ) -> Result<Placement, CoreError> {
        let dest = self.layout.artifact_path(transition.to, file_name)?;
        let backup = match transition.occupant {
            Occupant::Relocate(state) => Some(self.layout.artifact_path(state, file_name)?),
            Occupant::Discard => None,
        };
        let placement = place_artifact(source, &dest, backup.as_deref())?;
        if let Some(displaced) = &placement.displaced {
            info!(
                "previous {file_name} relocated to {}",
                displaced.display()
            );
        }
        Ok(placement)
    }

    /// Remove every entry of the disabled or recycle-bin directory.
    /// Returns the number of entries removed.
    pub fn purge_state(&self, state: DeploymentState) -> Result<usize, CoreError> {
        let dir = match state {
            DeploymentState::Disabled | DeploymentState::RecycleBin => {
                self.layout.state_dir(state)?
            }
            other => {
                return Err(CoreError::InvalidParameter {
                    param: "state",
                    value: other.to_string(),
                    expected: format!(
                        "{}, {}",
                        DeploymentState::Disabled,
                        DeploymentState::RecycleBin
                    ),
                })
            }
        };
        let _lock = self.lock()?;
        let removed = purge_dir(&dir)?;
        info!("purged {removed} entries from the {state} directory");
        Ok(removed)
    }

    /// Open the log file of a plugin instance. The handle closes on drop.
    pub fn get_logs(&self, instance: &str) -> Result<File, CoreError> {
        Ok(self.layout.open_log(instance)?)
    }

    fn lock(&self) -> Result<DeploymentLock, CoreError> {
        DeploymentLock::acquire(&self.layout.lock_file())
    }

    fn ensure_not_self(&self, manifest: &Manifest) -> Result<(), CoreError> {
        if manifest.same_package(&self.self_manifest) {
            warn!("refusing to act on the plugin manager itself");
            return Err(CoreError::InvalidSelfAction(manifest.canonical_name()));
        }
        Ok(())
    }
}
