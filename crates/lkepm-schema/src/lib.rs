//! Plugin manifest schema for lkepm.
//!
//! This crate defines the data layer shared by the parser and the deployment
//! manager: the `Manifest` record decoded from a package's `manifest.json`,
//! its required-field validation, and the `ArtifactName` every deployment
//! directory uses to name a package on disk.

pub mod manifest;
pub mod types;

pub use manifest::{
    parse_manifest_bytes, Manifest, ManifestError, ARTIFACT_EXTENSION,
    MANIFEST_FILE_NAME, PLUGIN_PREFIX,
};
pub use types::{is_artifact_file_name, ArtifactName};
