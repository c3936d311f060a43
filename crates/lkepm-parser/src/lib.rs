//! Plugin package parsing for lkepm.
//!
//! A package arrives as a filesystem path (archive file or directory), an
//! in-memory buffer, or a one-shot byte stream. The `source` module classifies
//! and opens it, the `extract` module finds every `manifest.json` candidate and
//! picks the authoritative one, and `PluginParser` wraps both behind a
//! single-use `Unparsed -> Parsed | Errored` state machine.

pub mod extract;
pub mod parser;
pub mod source;

pub use extract::{
    classify_entry, scan_archive, scan_directory, select_candidate, CandidateDepth,
    ManifestCandidate, MAX_MANIFEST_BYTES, WRAPPER_DIR,
};
pub use parser::{parse_source, ParseStatus, PluginParser};
pub use source::PackageSource;

use std::path::PathBuf;
use thiserror::Error;

/// Every way a parse can fail.
///
/// Cloneable so a parser can keep its terminal error while handing a copy to
/// the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("the path '{}' does not exist", .0.display())]
    PathNotFound(PathBuf),
    #[error("the path '{}' points to an invalid object, specify the path to a plugin file or folder", .0.display())]
    InvalidObject(PathBuf),
    #[error("invalid input for the plugin parser: {0}")]
    InvalidSource(String),
    #[error("not a valid plugin package: `manifest.json` not found")]
    ManifestNotFound,
    #[error("malformed `manifest.json`: {0}")]
    MalformedManifest(String),
    #[error("plugin already parsed, a parser can only be used once")]
    AlreadyParsed,
    #[error("unhandled error: {0}")]
    Unhandled(String),
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        ParseError::Unhandled(e.to_string())
    }
}

impl From<lkepm_schema::ManifestError> for ParseError {
    fn from(e: lkepm_schema::ManifestError) -> Self {
        ParseError::MalformedManifest(e.to_string())
    }
}
