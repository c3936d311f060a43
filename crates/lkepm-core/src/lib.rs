//! Deployment state manager for lkepm.
//!
//! `PluginManager` ties the parser and the store together: every lifecycle
//! operation parses its source, refuses to act on the manager's own package,
//! and then performs exactly one transition from the table in `lifecycle`,
//! holding the `DeploymentLock` for the duration. Every failure collapses
//! into the closed [`ErrorKind`] taxonomy so callers can branch on a stable
//! kind instead of matching nested error enums.

pub mod concurrency;
pub mod config;
pub mod lifecycle;
pub mod manager;

pub use concurrency::DeploymentLock;
pub use config::{ManagerConfig, RestoreMode};
pub use lifecycle::{validate_transition, Occupant, Operation, TransferKind, Transition};
pub use manager::PluginManager;

use lkepm_parser::ParseError;
use lkepm_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Manifest(#[from] lkepm_schema::ManifestError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("impossible to operate on the plugin '{0}' itself, perform the action manually on the server")]
    InvalidSelfAction(String),
    #[error("the plugin '{0}' does not exist among the available plugins in this distribution")]
    PackageNotFound(String),
    #[error("value '{value}' not supported for parameter {param}, pass any of [{expected}]")]
    InvalidParameter {
        param: &'static str,
        value: String,
        expected: String,
    },
    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("lock error: {0}")]
    Lock(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Closed set of failure kinds exposed to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    PathNotFound,
    InvalidObject,
    InvalidSource,
    ManifestNotFound,
    MalformedManifest,
    AlreadyParsed,
    InvalidSelfAction,
    InvalidFileName,
    PackageNotFound,
    InvalidParameter,
    Unhandled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::PathNotFound => "PathNotFound",
            ErrorKind::InvalidObject => "InvalidObject",
            ErrorKind::InvalidSource => "InvalidSource",
            ErrorKind::ManifestNotFound => "ManifestNotFound",
            ErrorKind::MalformedManifest => "MalformedManifest",
            ErrorKind::AlreadyParsed => "AlreadyParsed",
            ErrorKind::InvalidSelfAction => "InvalidSelfAction",
            ErrorKind::InvalidFileName => "InvalidFileName",
            ErrorKind::PackageNotFound => "PackageNotFound",
            ErrorKind::InvalidParameter => "InvalidParameter",
            ErrorKind::Unhandled => "Unhandled",
        }
    }

    /// Coarse label grouping kinds the way the admin UI reports them.
    pub fn category(self) -> &'static str {
        match self {
            ErrorKind::PathNotFound
            | ErrorKind::InvalidSource
            | ErrorKind::ManifestNotFound
            | ErrorKind::MalformedManifest
            | ErrorKind::PackageNotFound => "Invalid plugin",
            ErrorKind::InvalidObject | ErrorKind::InvalidParameter => "Invalid parameter",
            ErrorKind::AlreadyParsed | ErrorKind::InvalidSelfAction | ErrorKind::InvalidFileName => {
                "Invalid action"
            }
            ErrorKind::Unhandled => "Unhandled Error",
        }
    }

    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::PathNotFound | ErrorKind::PackageNotFound => 404,
            ErrorKind::Unhandled => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Manifest(_) => ErrorKind::MalformedManifest,
            CoreError::Parse(e) => match e {
                ParseError::PathNotFound(_) => ErrorKind::PathNotFound,
                ParseError::InvalidObject(_) => ErrorKind::InvalidObject,
                ParseError::InvalidSource(_) => ErrorKind::InvalidSource,
                ParseError::ManifestNotFound => ErrorKind::ManifestNotFound,
                ParseError::MalformedManifest(_) => ErrorKind::MalformedManifest,
                ParseError::AlreadyParsed => ErrorKind::AlreadyParsed,
                ParseError::Unhandled(_) => ErrorKind::Unhandled,
            },
            CoreError::Store(e) => match e {
                StoreError::PathNotFound(_) | StoreError::HostRootRequired(_) => {
                    ErrorKind::PathNotFound
                }
                StoreError::InvalidFileName(_) => ErrorKind::InvalidFileName,
                StoreError::Io(_) => ErrorKind::Unhandled,
            },
            CoreError::InvalidSelfAction(_) => ErrorKind::InvalidSelfAction,
            CoreError::PackageNotFound(_) => ErrorKind::PackageNotFound,
            CoreError::InvalidParameter { .. } | CoreError::Config(_) => ErrorKind::InvalidParameter,
            CoreError::InvalidTransition { .. } | CoreError::Lock(_) | CoreError::Io(_) => {
                ErrorKind::Unhandled
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from(self)
    }
}

/// Serializable `(kind, message)` pair for a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub status: &'static str,
    pub error: &'static str,
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&CoreError> for ErrorReport {
    fn from(e: &CoreError) -> Self {
        let kind = e.kind();
        Self {
            status: "error",
            error: kind.category(),
            kind,
            message: e.to_string(),
        }
    }
}
