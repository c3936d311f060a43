use crate::config::RestoreMode;
use crate::CoreError;
use lkepm_store::DeploymentState;
use std::fmt;

/// Lifecycle operations that move a package between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Place a caller-supplied artifact, leaving the original where it is.
    Install,
    /// Place a temporary upload, consuming it.
    Upload,
    /// Copy a bundled package out of the available catalog.
    InstallAvailable,
    Disable,
    Enable,
    Restore,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install => write!(f, "install"),
            Operation::Upload => write!(f, "upload"),
            Operation::InstallAvailable => write!(f, "install-available"),
            Operation::Disable => write!(f, "disable"),
            Operation::Enable => write!(f, "enable"),
            Operation::Restore => write!(f, "restore"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Move,
    Copy,
}

/// What happens to an artifact already holding the destination name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    /// Relocate it into the given state, replacing anything there.
    Relocate(DeploymentState),
    /// Remove it once the new artifact is in place.
    Discard,
}

/// One row of the lifecycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// `None` for artifacts arriving from outside the managed directories.
    pub from: Option<DeploymentState>,
    pub to: DeploymentState,
    pub transfer: TransferKind,
    pub occupant: Occupant,
}

impl Operation {
    pub fn transition(self, restore_mode: RestoreMode) -> Transition {
        let recycle = Occupant::Relocate(DeploymentState::RecycleBin);
        let (from, to, transfer, occupant) = match self {
            Operation::Install => (None, DeploymentState::Enabled, TransferKind::Copy, recycle),
            Operation::Upload => (None, DeploymentState::Enabled, TransferKind::Move, recycle),
            Operation::InstallAvailable => (
                Some(DeploymentState::Available),
                DeploymentState::Enabled,
                TransferKind::Copy,
                recycle,
            ),
            Operation::Disable => (
                Some(DeploymentState::Enabled),
                DeploymentState::Disabled,
                TransferKind::Move,
                recycle,
            ),
            Operation::Enable => (
                Some(DeploymentState::Disabled),
                DeploymentState::Enabled,
                TransferKind::Move,
                recycle,
            ),
            Operation::Restore => (
                Some(DeploymentState::RecycleBin),
                DeploymentState::Enabled,
                match restore_mode {
                    RestoreMode::Copy => TransferKind::Copy,
                    RestoreMode::Move => TransferKind::Move,
                },
                recycle,
            ),
            Operation::Delete => (
                Some(DeploymentState::Enabled),
                DeploymentState::RecycleBin,
                TransferKind::Move,
                Occupant::Discard,
            ),
        };
        Transition {
            from,
            to,
            transfer,
            occupant,
        }
    }
}

pub fn validate_transition(from: DeploymentState, to: DeploymentState) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (
            DeploymentState::Available | DeploymentState::Disabled | DeploymentState::RecycleBin,
            DeploymentState::Enabled
        ) | (
            DeploymentState::Enabled,
            DeploymentState::Disabled | DeploymentState::RecycleBin
        )
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
