use crate::types::ArtifactName;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Prefix every canonical plugin name carries.
pub const PLUGIN_PREFIX: &str = "lke-plugin-";
/// Extension of packaged plugin artifacts.
pub const ARTIFACT_EXTENSION: &str = "lke";
/// The only file name recognized as a package manifest.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("manifest field '{0}' must be a non-empty string")]
    MissingField(&'static str),
}

/// Declared identity and integration points of a plugin package.
///
/// `name` and `version` decode to empty strings when absent so that a
/// syntactically valid document always yields a `Manifest`; use
/// [`validate`](Self::validate) to enforce the required fields. Fields this
/// crate does not model are kept in `extra` and serialized back unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkurious_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_page_app_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_files: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Check the required fields. Optional fields are never an error.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::MissingField("name"));
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::MissingField("version"));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// The plugin name with [`PLUGIN_PREFIX`] applied exactly once.
    pub fn canonical_name(&self) -> String {
        if self.name.starts_with(PLUGIN_PREFIX) {
            self.name.clone()
        } else {
            format!("{PLUGIN_PREFIX}{}", self.name)
        }
    }

    /// On-disk artifact name: `<prefix-if-absent><name>-v<version>.lke`.
    pub fn normalized_name(&self) -> ArtifactName {
        ArtifactName::new(format!(
            "{}-v{}.{ARTIFACT_EXTENSION}",
            self.canonical_name(),
            self.version
        ))
    }

    /// Whether both manifests identify the same plugin, ignoring version and
    /// whether the name was declared with or without the prefix.
    pub fn same_package(&self, other: &Manifest) -> bool {
        self.canonical_name() == other.canonical_name()
    }
}

/// Decode manifest bytes. Only syntax and field types are checked here.
pub fn parse_manifest_bytes(input: &[u8]) -> Result<Manifest, ManifestError> {
    Ok(serde_json::from_slice(input)?)
}
