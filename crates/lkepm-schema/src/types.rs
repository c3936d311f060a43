//! Name types shared across deployment states.

use crate::manifest::ARTIFACT_EXTENSION;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::path::Path;

/// Canonical on-disk name of a plugin artifact, e.g. `lke-plugin-foo-v1.2.3.lke`.
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for ArtifactName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for ArtifactName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl PartialEq<str> for ArtifactName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ArtifactName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for ArtifactName {
    fn eq(&self, other: &String) -> bool {
        self.0 == *other
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Whether a directory entry name looks like a packaged plugin (`*.lke`).
///
/// Hidden entries never match, so the bookkeeping directories kept inside a
/// state directory are not mistaken for packages.
pub fn is_artifact_file_name(name: &str) -> bool {
    !name.starts_with('.')
        && name.len() > ARTIFACT_EXTENSION.len() + 1
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == ARTIFACT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_name_display_and_as_ref() {
        let name = ArtifactName::new("lke-plugin-foo-v1.0.0.lke");
        assert_eq!(name.to_string(), "lke-plugin-foo-v1.0.0.lke");
        assert_eq!(name.as_str(), "lke-plugin-foo-v1.0.0.lke");
        assert_eq!(
            AsRef::<Path>::as_ref(&name),
            Path::new("lke-plugin-foo-v1.0.0.lke")
        );
    }

    #[test]
    fn artifact_name_serializes_as_string() {
        let name = ArtifactName::from("lke-plugin-a-v1.lke");
        assert_eq!(
            serde_json::to_string(&name).unwrap(),
            "\"lke-plugin-a-v1.lke\""
        );
    }

    #[test]
    fn recognizes_artifact_file_names() {
        assert!(is_artifact_file_name("lke-plugin-foo-v1.0.0.lke"));
        assert!(is_artifact_file_name("custom.lke"));
        assert!(!is_artifact_file_name(".lke"));
        assert!(!is_artifact_file_name(".disabled"));
        assert!(!is_artifact_file_name("notes.txt"));
        assert!(!is_artifact_file_name("archive.lke.tmp"));
    }
}
